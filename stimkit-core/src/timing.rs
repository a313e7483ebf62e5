use serde::{Deserialize, Serialize};

/// When a stimulus is visible, relative to the start of its presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusTiming {
    #[serde(default, rename = "delay")]
    pub delay_ms: u64,
    /// `None` keeps the stimulus up until the trial ends.
    #[serde(default, rename = "duration")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Fade,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    #[serde(default)]
    pub kind: TransitionKind,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default, rename = "in")]
    pub enter: Option<TransitionSpec>,
    #[serde(default, rename = "out")]
    pub exit: Option<TransitionSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Visibility {
    Hidden,
    /// `progress` is set while an in/out transition is running.
    Visible { progress: Option<f32> },
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible { .. })
    }
}

impl StimulusTiming {
    pub fn new(delay_ms: u64, duration_ms: Option<u64>) -> Self {
        Self {
            delay_ms,
            duration_ms,
        }
    }

    pub fn visibility(&self, transition: Option<&Transition>, elapsed_ms: f64) -> Visibility {
        let local = elapsed_ms - self.delay_ms as f64;
        if local < 0.0 {
            return Visibility::Hidden;
        }
        if let Some(duration) = self.duration_ms {
            if local >= duration as f64 {
                return Visibility::Hidden;
            }
        }

        let Some(transition) = transition else {
            return Visibility::Visible { progress: None };
        };

        let mut progress: Option<f32> = None;
        if let Some(enter) = transition.enter.filter(active) {
            if local < enter.duration_ms as f64 {
                progress = Some((local / enter.duration_ms as f64) as f32);
            }
        }
        if let (Some(exit), Some(duration)) = (transition.exit.filter(active), self.duration_ms) {
            let remaining = duration as f64 - local;
            if remaining < exit.duration_ms as f64 {
                let p = (remaining / exit.duration_ms as f64) as f32;
                progress = Some(progress.map_or(p, |q| q.min(p)));
            }
        }

        Visibility::Visible {
            progress: progress.map(|p| p.clamp(0.0, 1.0)),
        }
    }
}

fn active(spec: &TransitionSpec) -> bool {
    spec.kind != TransitionKind::None && spec.duration_ms > 0
}
