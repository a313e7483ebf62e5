use thiserror::Error;

use crate::{ResourceKind, VoiceId};

/// Failure loading one asset. Always isolated to that asset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("failed to fetch `{locator}`: {reason}")]
    Fetch { locator: String, reason: String },

    #[error("failed to decode {kind} data: {reason}")]
    Decode { kind: ResourceKind, reason: String },

    #[error("decoded payload is {found}, expected {expected}")]
    KindMismatch {
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("load task for `{0}` did not complete")]
    Abandoned(String),
}

impl ResourceError {
    pub fn decode(kind: ResourceKind, reason: impl std::fmt::Display) -> Self {
        ResourceError::Decode {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Audio playback failures. None of them interrupt a trial.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("voice {0:?} already stopped")]
    AlreadyStopped(VoiceId),

    #[error("audio output context is closed")]
    ContextClosed,

    #[error("audio buffer is empty")]
    EmptyBuffer,
}
