use stimkit_core::{ConfigError, SessionPhase};
use stimkit_render::GraphicsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot {operation} while {phase:?}")]
    NotReady {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("session aborted: {0}")]
    Aborted(String),

    #[error("fixation marker: {0}")]
    Fixation(#[from] GraphicsError),
}
