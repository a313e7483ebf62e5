use rand::Rng;
use stimkit_core::{InputEvent, PendingTrial, Question, ResponseConfig, TrialRecord, TrialState};

const NS_PER_MS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialDurations {
    pub fixation_ms: u64,
    pub max_time_ms: u64,
    pub inter_trial_interval_ms: u64,
}

impl TrialDurations {
    /// Draws the fixation duration uniformly from the question's range.
    pub fn sample(question: &Question, rng: &mut impl Rng) -> Self {
        let fixation = &question.timing.fixation;
        let fixation_ms = if question.shows_fixation() {
            rng.random_range(fixation.min_ms..=fixation.max_ms.max(fixation.min_ms))
        } else {
            0
        };
        Self {
            fixation_ms,
            max_time_ms: question.timing.max_time_ms,
            inter_trial_interval_ms: question.timing.inter_trial_interval_ms,
        }
    }
}

/// Frame-clock stamps of one trial, in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialTimestamps {
    pub start: Option<u64>,
    pub stimulus_start: Option<u64>,
    /// First frame on which the target stimulus was drawn.
    pub onset: Option<u64>,
    pub response: Option<u64>,
    pub state_entered: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrialEvent {
    FixationStarted,
    StimulusStarted,
    Onset(u64),
    Finalized(TrialRecord),
    IntervalStarted,
    Completed,
}

/// One trial's state machine.
///
/// Every transition is a function of the current state and a caller-supplied
/// timestamp; the trial never reads a clock. The session feeds it frame
/// stamps and input stamps from the same [`Timer`](stimkit_timing::Timer).
#[derive(Debug, Clone)]
pub struct Trial {
    pub index: usize,
    pub question_id: String,
    pub practice: bool,
    pub durations: TrialDurations,
    pub timestamps: TrialTimestamps,
    state: TrialState,
    pending: Option<PendingTrial>,
    record: Option<TrialRecord>,
    finished: bool,
}

impl Trial {
    pub fn new(index: usize, question_id: impl Into<String>, practice: bool, durations: TrialDurations) -> Self {
        Self {
            index,
            question_id: question_id.into(),
            practice,
            durations,
            timestamps: TrialTimestamps::default(),
            state: TrialState::Idle,
            pending: None,
            record: None,
            finished: false,
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn record(&self) -> Option<&TrialRecord> {
        self.record.as_ref()
    }

    /// Back in `Idle` after the inter-trial interval.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Milliseconds since the stimulus phase began, for the render context.
    pub fn stimulus_time_ms(&self, now_ns: u64) -> Option<f64> {
        self.timestamps
            .stimulus_start
            .map(|start| now_ns.saturating_sub(start) as f64 / NS_PER_MS as f64)
    }

    pub fn begin(&mut self, now_ns: u64) -> Option<TrialEvent> {
        if self.state != TrialState::Idle || self.finished {
            return None;
        }
        self.timestamps.start = Some(now_ns);
        if self.durations.fixation_ms == 0 {
            self.enter_stimulus(now_ns);
            Some(TrialEvent::StimulusStarted)
        } else {
            self.enter(TrialState::Fixation, now_ns);
            Some(TrialEvent::FixationStarted)
        }
    }

    /// Applies the time-driven transitions due at `now_ns`.
    pub fn advance(&mut self, now_ns: u64) -> Option<TrialEvent> {
        let in_state = now_ns.saturating_sub(self.timestamps.state_entered);
        match self.state {
            TrialState::Fixation if in_state >= self.durations.fixation_ms * NS_PER_MS => {
                self.enter_stimulus(now_ns);
                Some(TrialEvent::StimulusStarted)
            }
            TrialState::StimulusOnset if in_state >= self.durations.max_time_ms * NS_PER_MS => {
                self.fail(now_ns, "stimulus never became visible")
            }
            TrialState::AwaitingResponse if in_state >= self.durations.max_time_ms * NS_PER_MS => {
                let pending = self.pending.take()?;
                Some(self.finalize(pending.miss(None), TrialState::TimedOut, now_ns))
            }
            // the interval runs from finalization, not from this frame
            TrialState::ResponseCaptured | TrialState::TimedOut => {
                let finalized_ns = self.timestamps.state_entered;
                self.enter(TrialState::InterTrialInterval, finalized_ns);
                Some(TrialEvent::IntervalStarted)
            }
            TrialState::InterTrialInterval
                if in_state >= self.durations.inter_trial_interval_ms * NS_PER_MS =>
            {
                self.enter(TrialState::Idle, now_ns);
                self.finished = true;
                Some(TrialEvent::Completed)
            }
            _ => None,
        }
    }

    /// Latches the onset on the first frame the target was drawn.
    pub fn mark_visible(&mut self, frame_ns: u64) -> Option<TrialEvent> {
        if self.state != TrialState::StimulusOnset {
            return None;
        }
        self.timestamps.onset = Some(frame_ns);
        self.pending = Some(PendingTrial::new(
            self.index,
            self.question_id.clone(),
            self.practice,
            frame_ns,
        ));
        self.enter(TrialState::AwaitingResponse, frame_ns);
        Some(TrialEvent::Onset(frame_ns))
    }

    /// Finalizes on the first qualifying input inside the response window.
    /// Input stamped before onset or at/after `maxTime` does not qualify.
    pub fn respond(&mut self, event: &InputEvent, response: &ResponseConfig) -> Option<TrialEvent> {
        if !self.state.accepts_input() {
            return None;
        }
        let onset = self.timestamps.onset?;
        if event.timestamp_ns < onset {
            tracing::debug!(
                question = %self.question_id,
                trial = self.index,
                early_ns = onset - event.timestamp_ns,
                "anticipatory input ignored"
            );
            return None;
        }
        if event.timestamp_ns - onset >= self.durations.max_time_ms * NS_PER_MS {
            return None;
        }
        if !response.accepts(&event.input) {
            return None;
        }
        let pending = self.pending.take()?;
        let record = pending.respond(
            event.timestamp_ns,
            Some(event.input.label()),
            response.is_correct(&event.input),
        );
        self.timestamps.response = Some(event.timestamp_ns);
        Some(self.finalize(record, TrialState::ResponseCaptured, event.timestamp_ns))
    }

    /// Finalizes as missed with `reason`, from any state before finalization.
    pub fn fail(&mut self, now_ns: u64, reason: impl Into<String>) -> Option<TrialEvent> {
        if self.record.is_some() || self.finished {
            return None;
        }
        let pending = self.pending.take().unwrap_or_else(|| {
            PendingTrial::new(
                self.index,
                self.question_id.clone(),
                self.practice,
                self.timestamps.onset.unwrap_or(now_ns),
            )
        });
        Some(self.finalize(pending.miss(Some(reason.into())), TrialState::TimedOut, now_ns))
    }

    fn enter(&mut self, state: TrialState, now_ns: u64) {
        self.state = state;
        self.timestamps.state_entered = now_ns;
    }

    fn enter_stimulus(&mut self, now_ns: u64) {
        self.timestamps.stimulus_start = Some(now_ns);
        self.enter(TrialState::StimulusOnset, now_ns);
    }

    fn finalize(&mut self, record: TrialRecord, state: TrialState, now_ns: u64) -> TrialEvent {
        self.enter(state, now_ns);
        self.record = Some(record.clone());
        TrialEvent::Finalized(record)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use stimkit_core::{QuestionKind, ResponseInput};

    use super::*;

    const MS: u64 = NS_PER_MS;

    fn durations() -> TrialDurations {
        TrialDurations {
            fixation_ms: 500,
            max_time_ms: 2500,
            inter_trial_interval_ms: 1000,
        }
    }

    fn space(at_ns: u64) -> InputEvent {
        InputEvent::new(ResponseInput::key("Space"), at_ns)
    }

    fn to_onset(trial: &mut Trial) -> u64 {
        assert_eq!(trial.begin(0), Some(TrialEvent::FixationStarted));
        assert_eq!(trial.advance(499 * MS), None);
        assert_eq!(trial.advance(500 * MS), Some(TrialEvent::StimulusStarted));
        // target first drawn one frame later
        let onset = 516 * MS;
        assert_eq!(trial.mark_visible(onset), Some(TrialEvent::Onset(onset)));
        onset
    }

    #[test]
    fn full_trial_with_response() {
        let mut trial = Trial::new(0, "rt", false, durations());
        let onset = to_onset(&mut trial);
        assert_eq!(trial.state(), TrialState::AwaitingResponse);

        let Some(TrialEvent::Finalized(record)) = trial.respond(&space(onset + 312 * MS), &ResponseConfig::default())
        else {
            panic!("response should finalize");
        };
        assert_eq!(record.reaction_time_ms, Some(312.0));
        assert_eq!(record.stimulus_onset_ns, onset);
        assert_eq!(record.key.as_deref(), Some("Space"));
        assert_eq!(trial.state(), TrialState::ResponseCaptured);

        assert_eq!(trial.advance(onset + 320 * MS), Some(TrialEvent::IntervalStarted));
        assert_eq!(trial.advance(onset + 1311 * MS), None);
        assert_eq!(trial.advance(onset + 1312 * MS), Some(TrialEvent::Completed));
        assert!(trial.is_finished());
        assert_eq!(trial.state(), TrialState::Idle);
    }

    #[test]
    fn input_outside_window_is_ignored() {
        let mut trial = Trial::new(0, "rt", false, durations());
        assert_eq!(trial.begin(0), Some(TrialEvent::FixationStarted));
        // fixation is not response-eligible
        assert_eq!(trial.respond(&space(100 * MS), &ResponseConfig::default()), None);

        let mut trial = Trial::new(0, "rt", false, durations());
        let onset = to_onset(&mut trial);
        assert_eq!(trial.respond(&space(onset - 1), &ResponseConfig::default()), None);

        let keys = ResponseConfig {
            keys: vec!["KeyF".into(), "KeyJ".into()],
            ..Default::default()
        };
        assert_eq!(trial.respond(&space(onset + MS), &keys), None);
        assert_eq!(trial.state(), TrialState::AwaitingResponse);
        assert!(matches!(
            trial.respond(&InputEvent::new(ResponseInput::key("KeyJ"), onset + 2 * MS), &keys),
            Some(TrialEvent::Finalized(_))
        ));
    }

    #[test]
    fn no_response_times_out_as_missed() {
        let mut trial = Trial::new(3, "rt", false, durations());
        let onset = to_onset(&mut trial);
        assert_eq!(trial.advance(onset + 2499 * MS), None);

        let Some(TrialEvent::Finalized(record)) = trial.advance(onset + 2500 * MS) else {
            panic!("maxTime should finalize");
        };
        assert!(record.missed);
        assert!(record.response_ns.is_none());
        assert!(record.reaction_time_ms.is_none());
        assert_eq!(trial.state(), TrialState::TimedOut);

        // late input after the window closed
        assert_eq!(trial.respond(&space(onset + 2600 * MS), &ResponseConfig::default()), None);

        // interval counted from the timeout, not from the frame that noticed it
        assert_eq!(trial.advance(onset + 2516 * MS), Some(TrialEvent::IntervalStarted));
        assert_eq!(trial.advance(onset + 3499 * MS), None);
        assert_eq!(trial.advance(onset + 3500 * MS), Some(TrialEvent::Completed));
    }

    #[test]
    fn input_at_max_time_does_not_qualify() {
        let mut trial = Trial::new(0, "rt", false, durations());
        let onset = to_onset(&mut trial);
        assert_eq!(trial.respond(&space(onset + 2500 * MS), &ResponseConfig::default()), None);
        assert!(matches!(trial.advance(onset + 2500 * MS), Some(TrialEvent::Finalized(r)) if r.missed));
    }

    #[test]
    fn finalized_exactly_once() {
        let mut trial = Trial::new(0, "rt", false, durations());
        let onset = to_onset(&mut trial);
        assert!(trial.respond(&space(onset + 10 * MS), &ResponseConfig::default()).is_some());
        assert_eq!(trial.respond(&space(onset + 20 * MS), &ResponseConfig::default()), None);
        assert_eq!(trial.fail(onset + 30 * MS, "late failure"), None);
        assert_eq!(trial.record().and_then(|r| r.reaction_time_ms), Some(10.0));
    }

    #[test]
    fn failure_before_onset_is_missed_with_reason() {
        let mut trial = Trial::new(1, "img", true, durations());
        trial.begin(7 * MS);
        let Some(TrialEvent::Finalized(record)) = trial.fail(8 * MS, "image failed to load") else {
            panic!("fail should finalize");
        };
        assert!(record.missed && record.practice);
        assert_eq!(record.error.as_deref(), Some("image failed to load"));
        assert_eq!(record.stimulus_onset_ns, 8 * MS);
    }

    #[test]
    fn invisible_stimulus_eventually_misses() {
        let mut trial = Trial::new(0, "rt", false, durations());
        trial.begin(0);
        trial.advance(500 * MS);
        assert!(matches!(
            trial.advance(3000 * MS),
            Some(TrialEvent::Finalized(r)) if r.missed && r.error.is_some()
        ));
    }

    #[test]
    fn no_fixation_starts_with_stimulus() {
        let mut trial = Trial::new(
            0,
            "likert",
            false,
            TrialDurations {
                fixation_ms: 0,
                ..durations()
            },
        );
        assert_eq!(trial.begin(5), Some(TrialEvent::StimulusStarted));
        assert_eq!(trial.stimulus_time_ms(5 + 20 * MS), Some(20.0));
    }

    #[test]
    fn fixation_jitter_stays_in_range() {
        let question: Question = serde_json::from_value(serde_json::json!({
            "id": "rt",
            "type": "reaction-time",
            "timing": {"fixation": {"min": 500, "max": 1500}}
        }))
        .unwrap();
        assert_eq!(question.kind, QuestionKind::ReactionTime);
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<u64> = (0..200)
            .map(|_| TrialDurations::sample(&question, &mut rng).fixation_ms)
            .collect();
        assert!(draws.iter().all(|d| (500..=1500).contains(d)));
        assert!(draws.iter().any(|d| *d != draws[0]));
    }
}
