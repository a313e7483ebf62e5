use serde::{Deserialize, Serialize};
use stimkit_core::{Color, ColorValue};

/// Session-wide settings, loaded next to the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Font resource for text stimuli that do not name one.
    pub default_font: Option<String>,
    pub font_size: f32,
    pub text_color: ColorValue,
    pub background: ColorValue,
    /// Frame intervals measured before the first page; `0` skips calibration.
    pub calibration_frames: usize,
    pub include_practice_in_stats: bool,
    /// Swap a media stimulus whose resources failed for its `fallbackText`.
    pub text_fallback: bool,
    pub fixation_size: u32,
    pub fixation_thickness: f32,
    pub fixation_color: ColorValue,
    /// Seed for fixation jitter. Unseeded sessions draw from the OS.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_font: None,
            font_size: 32.0,
            text_color: ColorValue::Css("#ffffff".into()),
            background: ColorValue::Css("#000000".into()),
            calibration_frames: 120,
            include_practice_in_stats: false,
            text_fallback: true,
            fixation_size: 40,
            fixation_thickness: 4.0,
            fixation_color: ColorValue::Css("#ffffff".into()),
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn color(value: &ColorValue, fallback: Color, what: &'static str) -> Color {
        value.resolve().unwrap_or_else(|err| {
            tracing::warn!(%err, setting = what, "invalid color in session config");
            fallback
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = SessionConfig::from_json(r#"{"calibrationFrames": 0, "background": [0.5, 0.5, 0.5]}"#).unwrap();
        assert_eq!(config.calibration_frames, 0);
        assert_eq!(config.background, ColorValue::Tuple(vec![0.5, 0.5, 0.5]));
        assert_eq!(config.font_size, 32.0);
        assert!(!config.include_practice_in_stats);
        assert!(config.text_fallback);
    }

    #[test]
    fn bad_color_falls_back() {
        let color = SessionConfig::color(&ColorValue::Css("nope".into()), Color::BLACK, "background");
        assert_eq!(color, Color::BLACK);
    }
}
