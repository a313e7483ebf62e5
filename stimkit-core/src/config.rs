use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ColorValue, Position, Size, StimulusTiming, Transition};

/// Declarative description of one stimulus as written by the designer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StimulusConfig {
    #[serde(default)]
    pub id: Option<String>,
    /// `text`, `image`, `video`, `audio`, `composite` or a registered custom type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Inline text for text stimuli, source locator for media stimuli.
    #[serde(default)]
    pub content: Option<String>,
    /// Source locator of a text resource to use instead of inline `content`.
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub transition: Option<Transition>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub timing: StimulusTiming,
    /// Children of a composite stimulus, in configuration order.
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    /// Text shown instead when this stimulus's media fails to load.
    #[serde(default)]
    pub fallback_text: Option<String>,
    /// Extra parameters passed through to custom stimulus constructors.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl StimulusConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            content: None,
            src: None,
            transition: None,
            position: Position::CENTER,
            size: None,
            style: StyleConfig::default(),
            timing: StimulusTiming::default(),
            components: Vec::new(),
            fallback_text: None,
            properties: Map::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::new("text")
        }
    }

    pub fn media(kind: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            content: Some(locator.into()),
            ..Self::new(kind)
        }
    }
}

/// One child slot of a composite stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(flatten)]
    pub stimulus: StimulusConfig,
    #[serde(default)]
    pub offset: Position,
    #[serde(default = "unit")]
    pub scale: f32,
    #[serde(default = "unit")]
    pub opacity: f32,
    /// Defaults to the component's index in the configuration.
    #[serde(default)]
    pub layer: Option<i32>,
}

impl ComponentConfig {
    pub fn new(stimulus: StimulusConfig) -> Self {
        Self {
            stimulus,
            offset: Position::CENTER,
            scale: 1.0,
            opacity: 1.0,
            layer: None,
        }
    }
}

fn unit() -> f32 {
    1.0
}

/// Visual and playback styling. Every field is optional so that factory
/// defaults apply when the designer leaves it out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    #[serde(default)]
    pub color: Option<ColorValue>,
    #[serde(default)]
    pub background: Option<ColorValue>,
    /// Font resource locator.
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub max_width: Option<f32>,
    #[serde(default)]
    pub padding: Option<f32>,
    #[serde(default)]
    pub line_height: Option<f32>,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
    #[serde(default)]
    pub autoplay: Option<bool>,
    #[serde(default, rename = "loop")]
    pub looping: Option<bool>,
    #[serde(default)]
    pub show_waveform: Option<bool>,
    /// Fragment shader resource locator replacing the built-in one.
    #[serde(default)]
    pub shader: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_components_flatten_their_stimulus() {
        let json = r##"{
            "type": "composite",
            "components": [
                {"type": "text", "content": "left", "offset": {"x": -50}, "layer": 2},
                {"type": "image", "content": "face.png", "scale": 0.5}
            ]
        }"##;
        let cfg: StimulusConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.components.len(), 2);
        let first = &cfg.components[0];
        assert_eq!(first.stimulus.kind, "text");
        assert_eq!(first.offset, Position::new(-50.0, 0.0));
        assert_eq!(first.layer, Some(2));
        assert_eq!(first.opacity, 1.0);
        assert_eq!(cfg.components[1].scale, 0.5);
        assert_eq!(cfg.components[1].layer, None);
    }

    #[test]
    fn style_reads_camel_case_fields() {
        let json = r##"{"type": "text", "content": "hi",
            "style": {"color": "#fff", "fontSize": 32, "maxWidth": 400, "loop": true}}"##;
        let cfg: StimulusConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.style.font_size, Some(32.0));
        assert_eq!(cfg.style.max_width, Some(400.0));
        assert_eq!(cfg.style.looping, Some(true));
        assert_eq!(cfg.style.color, Some(ColorValue::Css("#fff".into())));
    }
}
