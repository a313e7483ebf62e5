use serde::{Deserialize, Serialize};

/// Per-trial state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialState {
    Idle,
    Fixation,
    StimulusOnset,
    AwaitingResponse,
    ResponseCaptured,
    TimedOut,
    InterTrialInterval,
}

impl TrialState {
    /// Only the response window listens for input.
    pub fn accepts_input(&self) -> bool {
        matches!(self, TrialState::AwaitingResponse)
    }
}

/// A trial whose stimulus has been shown but whose outcome is not known yet.
/// Finalizing consumes it, so a trial can only be finalized once.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTrial {
    pub trial_index: usize,
    pub question_id: String,
    pub practice: bool,
    pub stimulus_onset_ns: u64,
}

impl PendingTrial {
    pub fn new(
        trial_index: usize,
        question_id: impl Into<String>,
        practice: bool,
        stimulus_onset_ns: u64,
    ) -> Self {
        Self {
            trial_index,
            question_id: question_id.into(),
            practice,
            stimulus_onset_ns,
        }
    }

    /// Finalizes with a response. Responses stamped before onset are clamped
    /// to a zero reaction time; callers filter anticipatory input first.
    pub fn respond(self, response_ns: u64, key: Option<String>, correct: Option<bool>) -> TrialRecord {
        let response_ns = response_ns.max(self.stimulus_onset_ns);
        let reaction_time_ms = (response_ns - self.stimulus_onset_ns) as f64 / 1_000_000.0;
        TrialRecord {
            trial_index: self.trial_index,
            question_id: self.question_id,
            practice: self.practice,
            stimulus_onset_ns: self.stimulus_onset_ns,
            response_ns: Some(response_ns),
            key,
            correct,
            reaction_time_ms: Some(reaction_time_ms),
            missed: false,
            error: None,
        }
    }

    /// Finalizes without a response, optionally carrying the reason the
    /// trial could not be presented.
    pub fn miss(self, error: Option<String>) -> TrialRecord {
        TrialRecord {
            trial_index: self.trial_index,
            question_id: self.question_id,
            practice: self.practice,
            stimulus_onset_ns: self.stimulus_onset_ns,
            response_ns: None,
            key: None,
            correct: None,
            reaction_time_ms: None,
            missed: true,
            error,
        }
    }
}

/// Immutable result of one finalized trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub trial_index: usize,
    pub question_id: String,
    pub practice: bool,
    pub stimulus_onset_ns: u64,
    pub response_ns: Option<u64>,
    pub key: Option<String>,
    pub correct: Option<bool>,
    pub reaction_time_ms: Option<f64>,
    pub missed: bool,
    pub error: Option<String>,
}

impl TrialRecord {
    /// Responded, non-practice trial.
    pub fn is_valid(&self) -> bool {
        !self.missed && !self.practice
    }
}
