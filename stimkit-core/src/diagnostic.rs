/// Error and diagnostic events surfaced to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    ResourceLoad {
        id: String,
        reason: String,
    },
    Shader {
        stimulus: String,
        reason: String,
    },
    Playback {
        stimulus: String,
        reason: String,
    },
    TrialInvalid {
        question_id: String,
        trial_index: usize,
        reason: String,
    },
    SessionAborted {
        reason: String,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::ResourceLoad { id, reason } => write!(f, "resource `{id}`: {reason}"),
            Diagnostic::Shader { stimulus, reason } => {
                write!(f, "shader for stimulus `{stimulus}`: {reason}")
            }
            Diagnostic::Playback { stimulus, reason } => {
                write!(f, "playback of `{stimulus}`: {reason}")
            }
            Diagnostic::TrialInvalid {
                question_id,
                trial_index,
                reason,
            } => write!(f, "trial {trial_index} of `{question_id}`: {reason}"),
            Diagnostic::SessionAborted { reason } => write!(f, "session aborted: {reason}"),
        }
    }
}

/// Caller-supplied receiver for [`Diagnostic`]s.
pub trait ErrorSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl<F> ErrorSink for F
where
    F: FnMut(Diagnostic),
{
    fn report(&mut self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

/// Sink that forwards everything to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::error!(%diagnostic, "engine diagnostic");
    }
}
