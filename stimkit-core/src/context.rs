/// Per-frame values handed to every `render` call. Never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    /// Milliseconds since the presentation this stimulus belongs to started.
    pub time_ms: f64,
    pub width: u32,
    pub height: u32,
    pub transition_progress: Option<f32>,
}

impl RenderContext {
    pub fn new(time_ms: f64, width: u32, height: u32) -> Self {
        Self {
            time_ms,
            width,
            height,
            transition_progress: None,
        }
    }

    pub fn with_progress(self, transition_progress: Option<f32>) -> Self {
        Self {
            transition_progress,
            ..self
        }
    }

    /// Same frame, seen from a child whose clock starts `offset_ms` later.
    pub fn shifted(self, offset_ms: f64) -> Self {
        Self {
            time_ms: self.time_ms - offset_ms,
            ..self
        }
    }

    /// Transition progress while a transition runs, full opacity otherwise.
    pub fn opacity(&self) -> f32 {
        self.transition_progress.unwrap_or(1.0)
    }
}
