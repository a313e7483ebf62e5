use serde::{Deserialize, Serialize};

use crate::ResponseConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseInput {
    /// Physical key code in the `KeyF` / `Space` / `ArrowLeft` naming.
    Key { code: String },
    Pointer { button: PointerButton, x: f32, y: f32 },
}

impl ResponseInput {
    pub fn key(code: impl Into<String>) -> Self {
        ResponseInput::Key { code: code.into() }
    }

    /// Label stored on the trial record.
    pub fn label(&self) -> String {
        match self {
            ResponseInput::Key { code } => code.clone(),
            ResponseInput::Pointer { .. } => "pointer".to_string(),
        }
    }
}

/// Participant input stamped with the same clock that stamps frames.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub input: ResponseInput,
    pub timestamp_ns: u64,
}

impl InputEvent {
    pub fn new(input: ResponseInput, timestamp_ns: u64) -> Self {
        Self {
            input,
            timestamp_ns,
        }
    }
}

impl ResponseConfig {
    /// Whether `input` belongs to the accepted response set.
    pub fn accepts(&self, input: &ResponseInput) -> bool {
        match input {
            ResponseInput::Key { code } => {
                self.keys.is_empty() || self.keys.iter().any(|k| same_key(k, code))
            }
            ResponseInput::Pointer { .. } => self.pointer,
        }
    }

    /// `None` when no correct responses are configured.
    pub fn is_correct(&self, input: &ResponseInput) -> Option<bool> {
        if self.correct.is_empty() {
            return None;
        }
        let label = input.label();
        Some(self.correct.iter().any(|c| same_key(c, &label)))
    }
}

/// Compares key names loosely so that `"f"`, `"F"` and `"KeyF"` match, as do
/// `" "` and `"Space"`.
fn same_key(a: &str, b: &str) -> bool {
    normalize_key(a) == normalize_key(b)
}

fn normalize_key(key: &str) -> String {
    if key == " " {
        return "space".to_string();
    }
    let lower = key.to_ascii_lowercase();
    match lower.strip_prefix("key").or_else(|| lower.strip_prefix("digit")) {
        Some(rest) if rest.chars().count() == 1 => rest.to_string(),
        _ => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_list_accepts_any_key_but_not_pointer() {
        let cfg = ResponseConfig::default();
        assert!(cfg.accepts(&ResponseInput::key("KeyQ")));
        assert!(!cfg.accepts(&ResponseInput::Pointer {
            button: PointerButton::Primary,
            x: 0.0,
            y: 0.0
        }));
    }

    #[test]
    fn key_names_match_loosely() {
        let cfg = ResponseConfig {
            keys: vec!["f".into(), " ".into()],
            pointer: false,
            correct: vec!["KeyF".into()],
        };
        assert!(cfg.accepts(&ResponseInput::key("KeyF")));
        assert!(cfg.accepts(&ResponseInput::key("Space")));
        assert!(!cfg.accepts(&ResponseInput::key("KeyJ")));
        assert_eq!(cfg.is_correct(&ResponseInput::key("KeyF")), Some(true));
        assert_eq!(cfg.is_correct(&ResponseInput::key("Space")), Some(false));
    }

    #[test]
    fn pointer_correctness_uses_pointer_label() {
        let cfg = ResponseConfig {
            keys: vec![],
            pointer: true,
            correct: vec!["pointer".into()],
        };
        let click = ResponseInput::Pointer {
            button: PointerButton::Primary,
            x: 1.0,
            y: 2.0,
        };
        assert!(cfg.accepts(&click));
        assert_eq!(cfg.is_correct(&click), Some(true));
    }
}
