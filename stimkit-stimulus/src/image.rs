use std::sync::Arc;

use stimkit_core::{LayerTransform, RenderContext, Size};
use stimkit_render::Graphics;
use stimkit_resources::{ResourceKind, ResourceManager};

use crate::text::dest_rect;
use crate::{Frame, StimulusError, TexturedQuad};

#[derive(Debug)]
pub struct ImageStimulus {
    pub locator: String,
    pub shader: Option<String>,
    pub(crate) quad: Option<TexturedQuad>,
}

impl ImageStimulus {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            shader: None,
            quad: None,
        }
    }

    pub(crate) fn requirements(&self, out: &mut Vec<(ResourceKind, String)>) {
        out.push((ResourceKind::Image, self.locator.clone()));
        if let Some(shader) = &self.shader {
            out.push((ResourceKind::Shader, shader.clone()));
        }
    }

    pub(crate) fn prepare(&mut self, id: &str, gpu: &mut dyn Graphics, resources: &ResourceManager) -> Result<(), StimulusError> {
        let img = resources
            .get_image(&self.locator)
            .ok_or_else(|| StimulusError::missing(id, &self.locator, resources.error(&self.locator)))?;
        let shader = shader_source(id, self.shader.as_deref(), resources)?;
        let quad = TexturedQuad::create(gpu, img.width(), img.height(), img.as_raw(), shader.as_deref())
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

/// Source of a custom fragment shader, if the stimulus names one.
pub(crate) fn shader_source(
    id: &str,
    shader: Option<&str>,
    resources: &ResourceManager,
) -> Result<Option<Arc<str>>, StimulusError> {
    let Some(locator) = shader else {
        return Ok(None);
    };
    resources
        .get_text(locator)
        .map(Some)
        .ok_or_else(|| StimulusError::missing(id, locator, resources.error(locator)))
}
