use stimkit_core::ColorError;
use stimkit_render::GraphicsError;
use thiserror::Error;

use crate::Lifecycle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StimulusError {
    #[error("unknown stimulus type `{0}`")]
    UnknownType(String),

    #[error("malformed composite `{id}`: {reason}")]
    MalformedComposite { id: String, reason: String },

    #[error("invalid configuration for `{id}`: {reason}")]
    InvalidConfig { id: String, reason: String },

    #[error("invalid color: {0}")]
    Color(#[from] ColorError),

    #[error("stimulus `{id}` is missing {resource}: {reason}")]
    MissingResource {
        id: String,
        resource: String,
        reason: String,
    },

    #[error("stimulus `{id}` cannot {operation} while {phase:?}")]
    Lifecycle {
        id: String,
        operation: &'static str,
        phase: Lifecycle,
    },

    #[error("stimulus `{id}`: {source}")]
    Graphics {
        id: String,
        #[source]
        source: GraphicsError,
    },
}

impl StimulusError {
    pub(crate) fn graphics(id: &str, source: GraphicsError) -> Self {
        StimulusError::Graphics {
            id: id.to_string(),
            source,
        }
    }

    pub(crate) fn missing(id: &str, resource: &str, reason: Option<&str>) -> Self {
        StimulusError::MissingResource {
            id: id.to_string(),
            resource: resource.to_string(),
            reason: reason.unwrap_or("not loaded").to_string(),
        }
    }

    /// Shader compile and program link failures end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StimulusError::Graphics { source, .. } if source.is_program_failure())
    }
}
