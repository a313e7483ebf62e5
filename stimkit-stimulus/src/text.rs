use stimkit_core::{Color, LayerTransform, Rect, RenderContext, Size};
use stimkit_render::{Graphics, TextStyle, pixmap_to_rgba, rasterize_text};
use stimkit_resources::{ResourceKind, ResourceManager};
use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::{Frame, StimulusError, TexturedQuad};

#[derive(Debug, Clone, PartialEq)]
pub enum TextSource {
    Inline(String),
    /// Locator of a text resource.
    Resource(String),
}

/// Text rasterized once in `prepare` and drawn as a texture.
#[derive(Debug)]
pub struct TextStimulus {
    pub source: TextSource,
    pub style: TextStyle,
    /// Font resource locator; falls back to the first loaded font.
    pub font: Option<String>,
    pub background: Option<Color>,
    pub shader: Option<String>,
    pub(crate) quad: Option<TexturedQuad>,
}

impl TextStimulus {
    pub fn new(source: TextSource, style: TextStyle) -> Self {
        Self {
            source,
            style,
            font: None,
            background: None,
            shader: None,
            quad: None,
        }
    }

    pub(crate) fn requirements(&self, out: &mut Vec<(ResourceKind, String)>) {
        if let TextSource::Resource(locator) = &self.source {
            out.push((ResourceKind::Text, locator.clone()));
        }
        if let Some(font) = &self.font {
            out.push((ResourceKind::Font, font.clone()));
        }
        if let Some(shader) = &self.shader {
            out.push((ResourceKind::Shader, shader.clone()));
        }
    }

    pub(crate) fn prepare(&mut self, id: &str, gpu: &mut dyn Graphics, resources: &ResourceManager) -> Result<(), StimulusError> {
        let font = match &self.font {
            Some(locator) => resources
                .get_font(locator)
                .ok_or_else(|| StimulusError::missing(id, locator, resources.error(locator)))?,
            None => resources
                .default_font()
                .ok_or_else(|| StimulusError::missing(id, "font", Some("no font loaded")))?,
        };
        let text = match &self.source {
            TextSource::Inline(text) => text.clone(),
            TextSource::Resource(locator) => resources
                .get_text(locator)
                .ok_or_else(|| StimulusError::missing(id, locator, resources.error(locator)))?
                .to_string(),
        };
        let shader = super::image::shader_source(id, self.shader.as_deref(), resources)?;

        let mut pixmap = rasterize_text(&font, &text, &self.style).map_err(|e| StimulusError::graphics(id, e))?;
        if let Some(bg) = self.background {
            pixmap = with_background(&pixmap, bg).ok_or_else(|| StimulusError::InvalidConfig {
                id: id.to_string(),
                reason: "text surface too large".into(),
            })?;
        }
        let quad = TexturedQuad::create(
            gpu,
            pixmap.width(),
            pixmap.height(),
            &pixmap_to_rgba(&pixmap),
            shader.as_deref(),
        )
        .map_err(|e| StimulusError::graphics(id, e))?;
        self.quad = Some(quad);
        Ok(())
    }

    pub(crate) fn draw(
        &mut self,
        id: &str,
        frame: &mut Frame<'_>,
        ctx: &RenderContext,
        transform: &LayerTransform,
        size: Option<Size>,
    ) -> Result<(), StimulusError> {
        let Some(quad) = &self.quad else {
            return Ok(());
        };
        let dest = dest_rect(ctx, transform, size, quad.size());
        quad.draw(frame.gpu, dest, transform.opacity)
            .map_err(|e| StimulusError::graphics(id, e))
    }

    pub(crate) fn release(&mut self, gpu: &mut dyn Graphics) {
        if let Some(quad) = self.quad.take() {
            quad.release(gpu);
        }
    }
}

fn with_background(text: &Pixmap, color: Color) -> Option<Pixmap> {
    let mut out = Pixmap::new(text.width(), text.height())?;
    let [r, g, b, a] = color.to_rgba8();
    out.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
    out.draw_pixmap(0, 0, text.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
    Some(out)
}

/// Viewport rectangle of a quad placed by `transform`. An explicit size
/// replaces the texture's own.
pub(crate) fn dest_rect(ctx: &RenderContext, transform: &LayerTransform, size: Option<Size>, natural: (u32, u32)) -> Rect {
    let size = size.unwrap_or(Size::new(natural.0 as f32, natural.1 as f32));
    let scaled = Size::new(size.width * transform.scale, size.height * transform.scale);
    Rect::centered(transform.offset, scaled, ctx.width, ctx.height)
}
