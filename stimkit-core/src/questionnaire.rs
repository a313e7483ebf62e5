use serde::{Deserialize, Serialize};

use crate::{ColorValue, ConfigError, Position, StimulusConfig, StyleConfig};

/// Read-only questionnaire definition produced by the authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub pages: Vec<Page>,
}

impl Questionnaire {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let questionnaire: Questionnaire = serde_json::from_str(json)?;
        questionnaire.validate()?;
        Ok(questionnaire)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pages.is_empty() {
            return Err(ConfigError::Empty);
        }
        for question in self.pages.iter().flat_map(|p| p.questions.iter()) {
            question.validate()?;
        }
        Ok(())
    }

    pub fn question_count(&self) -> usize {
        self.pages.iter().map(|p| p.questions.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    ReactionTime,
    #[default]
    Stimulus,
    Instruction,
    /// Question types owned by the authoring layer that the engine only
    /// presents as prompt + stimulus.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: QuestionKind,
    /// Prompt text shown alongside the stimulus.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub stimulus: Option<StimulusConfig>,
    #[serde(default)]
    pub timing: QuestionTiming,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub trials: TrialPlan,
}

impl Question {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: String| ConfigError::Question {
            question: self.id.clone(),
            reason,
        };
        if self.trials.count == 0 {
            return Err(fail("trial count must be at least 1".into()));
        }
        if self.trials.practice > self.trials.count {
            return Err(fail(format!(
                "{} practice trials exceed the {} total trials",
                self.trials.practice, self.trials.count
            )));
        }
        let fixation = &self.timing.fixation;
        if fixation.min_ms > fixation.max_ms {
            return Err(fail(format!(
                "fixation range {}..{} ms is inverted",
                fixation.min_ms, fixation.max_ms
            )));
        }
        if self.timing.max_time_ms == 0 {
            return Err(fail("maxTime must be positive".into()));
        }
        Ok(())
    }

    /// Whether trials of this question open with a fixation marker.
    pub fn shows_fixation(&self) -> bool {
        self.display
            .fixation
            .unwrap_or(self.kind == QuestionKind::ReactionTime)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    #[serde(default = "default_prompt_position")]
    pub prompt_position: Position,
    #[serde(default)]
    pub prompt_style: StyleConfig,
    /// Defaults to on for reaction-time questions, off otherwise.
    #[serde(default)]
    pub fixation: Option<bool>,
    #[serde(default)]
    pub background: Option<ColorValue>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            prompt_position: default_prompt_position(),
            prompt_style: StyleConfig::default(),
            fixation: None,
            background: None,
        }
    }
}

fn default_prompt_position() -> Position {
    Position::new(0.0, -200.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixationTiming {
    #[serde(rename = "min")]
    pub min_ms: u64,
    #[serde(rename = "max")]
    pub max_ms: u64,
}

impl Default for FixationTiming {
    fn default() -> Self {
        Self {
            min_ms: 500,
            max_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTiming {
    #[serde(default)]
    pub fixation: FixationTiming,
    /// Response window measured from stimulus onset.
    #[serde(default = "default_max_time", rename = "maxTime")]
    pub max_time_ms: u64,
    #[serde(default = "default_iti", rename = "interTrialInterval")]
    pub inter_trial_interval_ms: u64,
}

impl Default for QuestionTiming {
    fn default() -> Self {
        Self {
            fixation: FixationTiming::default(),
            max_time_ms: default_max_time(),
            inter_trial_interval_ms: default_iti(),
        }
    }
}

fn default_max_time() -> u64 {
    2000
}

fn default_iti() -> u64 {
    1000
}

/// Which inputs count as a response, and which of them are correct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    /// Accepted key codes; empty accepts any key.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub pointer: bool,
    /// Keys (or `"pointer"`) scored as correct; empty leaves correctness unknown.
    #[serde(default)]
    pub correct: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialPlan {
    /// Total trials, practice included.
    #[serde(default = "one_trial")]
    pub count: usize,
    /// Leading trials flagged as practice/warmup.
    #[serde(default, alias = "warmup")]
    pub practice: usize,
}

impl Default for TrialPlan {
    fn default() -> Self {
        Self {
            count: 1,
            practice: 0,
        }
    }
}

fn one_trial() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    const REACTION: &str = r##"{
        "pages": [{
            "id": "p1",
            "questions": [{
                "id": "rt",
                "type": "reaction-time",
                "text": "Press space when the circle appears",
                "stimulus": {"type": "image", "content": "circle.png"},
                "timing": {"fixation": {"min": 400, "max": 800}, "maxTime": 2500},
                "response": {"keys": ["Space"]},
                "trials": {"count": 20, "warmup": 3}
            }]
        }]
    }"##;

    #[test]
    fn parses_reaction_question() {
        let q = Questionnaire::from_json(REACTION).unwrap();
        let question = &q.pages[0].questions[0];
        assert_eq!(question.kind, QuestionKind::ReactionTime);
        assert_eq!(question.timing.max_time_ms, 2500);
        assert_eq!(question.timing.inter_trial_interval_ms, 1000);
        assert_eq!(question.trials.count, 20);
        assert_eq!(question.trials.practice, 3);
        assert!(question.shows_fixation());
        assert_eq!(q.question_count(), 1);
    }

    #[test]
    fn unknown_question_types_are_tolerated() {
        let json = r#"{"pages": [{"id": "p", "questions": [{"id": "q", "type": "likert"}]}]}"#;
        let q = Questionnaire::from_json(json).unwrap();
        assert_eq!(q.pages[0].questions[0].kind, QuestionKind::Other);
        assert!(!q.pages[0].questions[0].shows_fixation());
    }

    #[test]
    fn rejects_more_practice_than_trials() {
        let json = r#"{"pages": [{"id": "p", "questions": [
            {"id": "q", "trials": {"count": 2, "practice": 3}}]}]}"#;
        let err = Questionnaire::from_json(json).unwrap_err();
        assert!(err.to_string().contains("practice"));
    }

    #[test]
    fn rejects_empty_questionnaire() {
        assert!(matches!(
            Questionnaire::from_json(r#"{"pages": []}"#),
            Err(ConfigError::Empty)
        ));
    }
}
