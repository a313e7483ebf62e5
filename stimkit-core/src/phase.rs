/// Coarse session phases, in order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Measuring frame intervals before anything is shown.
    #[default]
    Calibration,
    /// Waiting for the current page's resources.
    Loading,
    Running,
    Complete,
    /// Stopped by a fatal rendering error.
    Aborted,
}

impl SessionPhase {
    pub fn allows_input(&self) -> bool {
        matches!(self, SessionPhase::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SessionPhase::Complete | SessionPhase::Aborted)
    }

    /// Phase that follows in a normal run; pages loop between `Loading` and
    /// `Running`, so the session decides that edge itself.
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Calibration => Loading,
            Loading => Running,
            Running => Complete,
            Complete | Aborted => return None,
        })
    }
}
