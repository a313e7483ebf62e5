use std::collections::HashMap;

use stimkit_core::{Color, ColorValue, LayerTransform, Question, StimulusConfig};
use stimkit_render::{TextAlign, TextStyle};

use crate::{
    AudioStimulus, Component, CompositeStimulus, CustomConstructor, CustomStimulus, ImageStimulus, Stimulus,
    StimulusBody, StimulusError, TextSource, TextStimulus, VideoStimulus,
};

/// Stimuli synthesized for one question.
#[derive(Debug, Default)]
pub struct QuestionStimuli {
    /// Prompt text, positioned on its own.
    pub prompt: Option<Stimulus>,
    pub main: Option<Stimulus>,
}

impl QuestionStimuli {
    /// Prompt first, so the main stimulus draws over it.
    pub fn into_vec(self) -> Vec<Stimulus> {
        self.prompt.into_iter().chain(self.main).collect()
    }
}

/// Builds stimulus trees from declarative configuration.
pub struct StimulusFactory {
    custom: HashMap<String, CustomConstructor>,
    default_font: Option<String>,
    default_font_size: f32,
    default_color: Color,
}

impl std::fmt::Debug for StimulusFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StimulusFactory")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .field("default_font", &self.default_font)
            .field("default_font_size", &self.default_font_size)
            .finish()
    }
}

impl Default for StimulusFactory {
    fn default() -> Self {
        Self {
            custom: HashMap::new(),
            default_font: None,
            default_font_size: TextStyle::default().font_size,
            default_color: Color::WHITE,
        }
    }
}

impl StimulusFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font resource used by text stimuli that do not name one.
    pub fn with_default_font(mut self, locator: impl Into<String>) -> Self {
        self.default_font = Some(locator.into());
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.default_font_size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.default_color = color;
        self
    }

    /// Registers a constructor for `type_name`. Built-in type names cannot
    /// be overridden.
    pub fn register_custom<F>(&mut self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn(&StimulusConfig) -> Result<Box<dyn CustomStimulus>, StimulusError> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        tracing::debug!(type_name = %type_name, "custom stimulus type registered");
        self.custom.insert(type_name, Box::new(constructor));
    }

    pub fn create_stimulus(&self, config: &StimulusConfig) -> Result<Stimulus, StimulusError> {
        self.build(config, config.kind.clone())
    }

    /// Optional prompt text plus the question's main stimulus.
    pub fn create_questionnaire_stimuli(&self, question: &Question) -> Result<QuestionStimuli, StimulusError> {
        let prompt = match question.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let config = StimulusConfig {
                    id: Some(format!("{}-prompt", question.id)),
                    position: question.display.prompt_position,
                    style: question.display.prompt_style.clone(),
                    ..StimulusConfig::text(text)
                };
                Some(self.create_stimulus(&config)?)
            }
            _ => None,
        };
        let main = question
            .stimulus
            .as_ref()
            .map(|config| self.build(config, format!("{}-stimulus", question.id)))
            .transpose()?;
        Ok(QuestionStimuli { prompt, main })
    }

    /// Text stand-in for a media stimulus whose resources failed to load.
    pub fn create_fallback(&self, config: &StimulusConfig, id: &str) -> Option<Stimulus> {
        let text = config.fallback_text.as_deref()?;
        let fallback = StimulusConfig {
            id: Some(format!("{id}-fallback")),
            position: config.position,
            timing: config.timing,
            transition: config.transition,
            style: config.style.clone(),
            ..StimulusConfig::text(text)
        };
        match self.create_stimulus(&fallback) {
            Ok(stimulus) => Some(stimulus),
            Err(err) => {
                tracing::warn!(stimulus = id, %err, "fallback text could not be built");
                None
            }
        }
    }

    fn build(&self, config: &StimulusConfig, default_id: String) -> Result<Stimulus, StimulusError> {
        let id = config.id.clone().unwrap_or(default_id);
        let style = &config.style;

        let body = match config.kind.to_ascii_lowercase().as_str() {
            "text" => StimulusBody::Text(self.text(&id, config)?),
            "image" => {
                let mut image = ImageStimulus::new(source(&id, config)?);
                image.shader = style.shader.clone();
                StimulusBody::Image(image)
            }
            "video" => {
                let mut video = VideoStimulus::new(source(&id, config)?);
                video.autoplay = style.autoplay.unwrap_or(true);
                video.looping = style.looping.unwrap_or(false);
                video.shader = style.shader.clone();
                StimulusBody::Video(video)
            }
            "audio" => {
                let mut audio = AudioStimulus::new(source(&id, config)?);
                audio.volume = style.volume.unwrap_or(1.0).clamp(0.0, 1.0);
                audio.show_waveform = style.show_waveform.unwrap_or(false);
                audio.waveform_color = resolve(style.color.as_ref())?.unwrap_or(self.default_color);
                StimulusBody::Audio(audio)
            }
            "composite" => StimulusBody::Composite(self.composite(&id, config)?),
            _ => {
                let Some(constructor) = self.custom.get(&config.kind) else {
                    return Err(StimulusError::UnknownType(config.kind.clone()));
                };
                StimulusBody::Custom {
                    handler: config.kind.clone(),
                    inner: constructor(config)?,
                }
            }
        };

        let mut stimulus = Stimulus::new(id, body)
            .with_timing(config.timing)
            .with_transition(config.transition)
            .with_position(config.position)
            .with_size(config.size);
        stimulus.scale = style.scale.unwrap_or(1.0);
        stimulus.opacity = style.opacity.unwrap_or(1.0).clamp(0.0, 1.0);
        Ok(stimulus)
    }

    fn text(&self, id: &str, config: &StimulusConfig) -> Result<TextStimulus, StimulusError> {
        let source = match (&config.src, &config.content) {
            (Some(src), _) => TextSource::Resource(src.clone()),
            (None, Some(content)) => TextSource::Inline(content.clone()),
            (None, None) => {
                return Err(StimulusError::InvalidConfig {
                    id: id.to_string(),
                    reason: "text stimulus needs `content` or `src`".into(),
                });
            }
        };
        let style = &config.style;
        let defaults = TextStyle::default();
        let text_style = TextStyle {
            font_size: style.font_size.unwrap_or(self.default_font_size),
            color: resolve(style.color.as_ref())?.unwrap_or(self.default_color),
            max_width: style.max_width,
            padding: style.padding.unwrap_or(defaults.padding),
            line_height: style.line_height.unwrap_or(defaults.line_height),
            align: TextAlign::Center,
        };
        let mut text = TextStimulus::new(source, text_style);
        text.font = style.font.clone().or_else(|| self.default_font.clone());
        text.background = resolve(style.background.as_ref())?;
        text.shader = style.shader.clone();
        Ok(text)
    }

    fn composite(&self, id: &str, config: &StimulusConfig) -> Result<CompositeStimulus, StimulusError> {
        if config.components.is_empty() {
            return Err(StimulusError::MalformedComposite {
                id: id.to_string(),
                reason: "no components".into(),
            });
        }
        let mut children = Vec::with_capacity(config.components.len());
        for (index, component) in config.components.iter().enumerate() {
            if !(component.scale.is_finite() && component.scale > 0.0) {
                return Err(StimulusError::MalformedComposite {
                    id: id.to_string(),
                    reason: format!("component {index} has scale {}", component.scale),
                });
            }
            let stimulus = self.build(&component.stimulus, format!("{id}/{index}"))?;
            children.push(Component {
                stimulus,
                transform: LayerTransform::new(
                    component.offset,
                    component.scale,
                    component.opacity.clamp(0.0, 1.0),
                ),
                layer: component.layer.unwrap_or(index as i32),
            });
        }
        Ok(CompositeStimulus::new(children))
    }
}

fn source(id: &str, config: &StimulusConfig) -> Result<String, StimulusError> {
    config
        .content
        .as_ref()
        .or(config.src.as_ref())
        .filter(|s| !s.is_empty())
        .cloned()
        .ok_or_else(|| StimulusError::InvalidConfig {
            id: id.to_string(),
            reason: format!("{} stimulus needs a source locator", config.kind),
        })
}

fn resolve(value: Option<&ColorValue>) -> Result<Option<Color>, StimulusError> {
    Ok(value.map(ColorValue::resolve).transpose()?)
}

#[cfg(test)]
mod tests {
    use stimkit_core::{ComponentConfig, Position, RenderContext};
    use stimkit_resources::ResourceManager;

    use super::*;
    use crate::Frame;

    #[derive(Debug)]
    struct Dots;

    impl CustomStimulus for Dots {
        fn prepare(&mut self, _frame: &mut Frame<'_>, _resources: &ResourceManager) -> Result<(), StimulusError> {
            Ok(())
        }

        fn render(&mut self, _frame: &mut Frame<'_>, _ctx: &RenderContext, _transform: &LayerTransform) -> Result<(), StimulusError> {
            Ok(())
        }

        fn cleanup(&mut self, _frame: &mut Frame<'_>) {}
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.002
    }

    #[test]
    fn builds_each_builtin_variant() {
        let factory = StimulusFactory::new();
        for (kind, expected) in [("image", "image"), ("Video", "video"), ("audio", "audio")] {
            let stim = factory
                .create_stimulus(&StimulusConfig::media(kind, "file.bin"))
                .unwrap();
            assert_eq!(stim.kind(), expected);
        }
        let text = factory.create_stimulus(&StimulusConfig::text("hello")).unwrap();
        assert_eq!(text.kind(), "text");
    }

    #[test]
    fn unknown_types_consult_the_registry_first() {
        let mut factory = StimulusFactory::new();
        let err = factory
            .create_stimulus(&StimulusConfig::new("dots"))
            .unwrap_err();
        assert_eq!(err, StimulusError::UnknownType("dots".into()));

        factory.register_custom("dots", |_cfg: &StimulusConfig| {
            Ok(Box::new(Dots) as Box<dyn CustomStimulus>)
        });
        let stim = factory.create_stimulus(&StimulusConfig::new("dots")).unwrap();
        assert_eq!(stim.kind(), "dots");
    }

    #[test]
    fn text_colors_parse_from_css_and_tuples() {
        let factory = StimulusFactory::new();
        let json = r##"{"type": "text", "content": "x", "style": {"color": "#3b82f6", "background": [0, 0, 0, 0.5]}}"##;
        let config: StimulusConfig = serde_json::from_str(json).unwrap();
        let stim = factory.create_stimulus(&config).unwrap();
        let StimulusBody::Text(text) = stim.body() else {
            panic!("expected text body");
        };
        let c = text.style.color;
        assert!(close(c.r, 0.231) && close(c.g, 0.510) && close(c.b, 0.965) && close(c.a, 1.0));
        assert_eq!(text.background, Some(Color::rgba(0.0, 0.0, 0.0, 0.5)));

        let bad: StimulusConfig =
            serde_json::from_str(r##"{"type": "text", "content": "x", "style": {"color": "#12"}}"##).unwrap();
        assert!(matches!(factory.create_stimulus(&bad), Err(StimulusError::Color(_))));
    }

    #[test]
    fn composite_layers_default_to_configuration_order() {
        let factory = StimulusFactory::new();
        let mut config = StimulusConfig::new("composite");
        config.id = Some("scene".into());
        for (locator, layer) in [("a.png", Some(2)), ("b.png", None), ("c.png", Some(0))] {
            let mut component = ComponentConfig::new(StimulusConfig::media("image", locator));
            component.layer = layer;
            config.components.push(component);
        }
        let stim = factory.create_stimulus(&config).unwrap();
        let StimulusBody::Composite(composite) = stim.body() else {
            panic!("expected composite body");
        };
        let order: Vec<(&str, i32)> = composite
            .children()
            .iter()
            .map(|c| (c.stimulus.id.as_str(), c.layer))
            .collect();
        assert_eq!(order, vec![("scene/2", 0), ("scene/1", 1), ("scene/0", 2)]);
    }

    #[test]
    fn malformed_composites_are_rejected() {
        let factory = StimulusFactory::new();
        let empty = factory.create_stimulus(&StimulusConfig::new("composite"));
        assert!(matches!(empty, Err(StimulusError::MalformedComposite { .. })));

        let mut nested_unknown = StimulusConfig::new("composite");
        nested_unknown
            .components
            .push(ComponentConfig::new(StimulusConfig::new("hologram")));
        assert_eq!(
            factory.create_stimulus(&nested_unknown).unwrap_err(),
            StimulusError::UnknownType("hologram".into())
        );
    }

    #[test]
    fn question_prompt_is_synthesized_separately() {
        let factory = StimulusFactory::new().with_default_font("fonts/sans.ttf");
        let json = r#"{"id": "q1", "type": "reaction-time", "text": "Press F when you see the face",
            "stimulus": {"type": "image", "content": "face.png"}}"#;
        let question: Question = serde_json::from_str(json).unwrap();
        let stimuli = factory.create_questionnaire_stimuli(&question).unwrap();

        let prompt = stimuli.prompt.as_ref().unwrap();
        assert_eq!(prompt.id, "q1-prompt");
        assert_eq!(prompt.position, Position::new(0.0, -200.0));
        let StimulusBody::Text(text) = prompt.body() else {
            panic!("expected text prompt");
        };
        assert_eq!(text.font.as_deref(), Some("fonts/sans.ttf"));
        assert_eq!(stimuli.main.as_ref().unwrap().id, "q1-stimulus");
        assert_eq!(stimuli.into_vec().len(), 2);
    }

    #[test]
    fn fallback_text_keeps_placement() {
        let factory = StimulusFactory::new();
        let mut config = StimulusConfig::media("image", "face.png");
        config.position = Position::new(10.0, 20.0);
        assert!(factory.create_fallback(&config, "face").is_none());

        config.fallback_text = Some("[face]".into());
        let fallback = factory.create_fallback(&config, "face").unwrap();
        assert_eq!(fallback.id, "face-fallback");
        assert_eq!(fallback.kind(), "text");
        assert_eq!(fallback.position, Position::new(10.0, 20.0));
    }
}
