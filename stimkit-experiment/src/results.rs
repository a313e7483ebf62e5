use serde::Serialize;
use stimkit_core::{ReactionTestStats, TrialRecord};
use stimkit_timing::CalibrationStats;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationSummary {
    pub samples: usize,
    pub mean_frame_ms: f64,
    pub jitter_ms: f64,
    pub min_frame_ms: f64,
    pub max_frame_ms: f64,
    pub refresh_hz: f64,
}

impl From<&CalibrationStats> for CalibrationSummary {
    fn from(stats: &CalibrationStats) -> Self {
        Self {
            samples: stats.samples,
            mean_frame_ms: stats.average_frame_time_ns / 1e6,
            jitter_ms: stats.jitter_ns / 1e6,
            min_frame_ms: stats.min_frame_time_ns / 1e6,
            max_frame_ms: stats.max_frame_time_ns / 1e6,
            refresh_hz: stats.effective_fps,
        }
    }
}

/// Everything a finished (or aborted) session hands back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResults {
    pub questionnaire_id: Option<String>,
    pub trials: Vec<TrialRecord>,
    pub stats: ReactionTestStats,
    pub calibration: Option<CalibrationSummary>,
    pub aborted: Option<String>,
}

impl SessionResults {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
