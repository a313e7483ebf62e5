use std::sync::Arc;

use stimkit_core::{LayerTransform, RenderContext, Size};
use stimkit_render::Graphics;
use stimkit_resources::{ResourceKind, ResourceManager, VideoClip};

use crate::image::shader_source;
use crate::text::dest_rect;
use crate::{Frame, StimulusError, TexturedQuad};

/// Minimum time between two texture uploads, roughly one 60 Hz frame.
const MIN_UPLOAD_INTERVAL_MS: f64 = 16.0;

#[derive(Debug)]
pub struct VideoStimulus {
    pub locator: String,
    pub autoplay: bool,
    pub looping: bool,
    pub shader: Option<String>,
    clip: Option<Arc<VideoClip>>,
    quad: Option<TexturedQuad>,
    playback_start_ms: Option<f64>,
    last_upload_ms: Option<f64>,
    shown_frame: usize,
    uploads: usize,
}

impl VideoStimulus {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            autoplay: true,
            looping: false,
            shader: None,
            clip: None,
            quad: None,
            playback_start_ms: None,
            last_upload_ms: None,
            shown_frame: 0,
            uploads: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback_start_ms.is_some()
    }

    /// Texture updates issued since `prepare`.
    pub fn texture_uploads(&self) -> usize {
        self.uploads
    }

    pub(crate) fn requirements(&self, out: &mut Vec<(ResourceKind, String)>) {
        out.push((ResourceKind::Video, self.locator.clone()));
        if let Some(shader) = &self.shader {
            out.push((ResourceKind::Shader, shader.clone()));
        }
    }

    pub(crate) fn prepare(&mut self, id: &str, gpu: &mut dyn Graphics, resources: &ResourceManager) -> Result<(), StimulusError> {
        let clip = resources
            .get_video(&self.locator)
            .ok_or_else(|| StimulusError::missing(id, &self.locator, resources.error(&self.locator)))?;
        let first = clip
            .frames
            .first()
            .ok_or_else(|| StimulusError::missing(id, &self.locator, Some("clip has no frames")))?;
        let shader = shader_source(id, self.shader.as_deref(), resources)?;
        let quad = TexturedQuad::create(
            gpu,
            first.image.width(),
            first.image.height(),
            first.image.as_raw(),
            shader.as_deref(),
        )
        .map_err(|e| StimulusError::graphics(id, e))?;

        self.quad = Some(quad);
        self.clip = Some(clip);
        self.playback_start_ms = None;
        self.last_upload_ms = None;
        self.shown_frame = 0;
        self.uploads = 0;
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
        let (Some(quad), Some(clip)) = (&mut self.quad, &self.clip) else {
            return Ok(());
        };

        if self.playback_start_ms.is_none() && self.autoplay {
            tracing::debug!(stimulus = id, at_ms = ctx.time_ms, "video playback started");
            self.playback_start_ms = Some(ctx.time_ms);
        }

        if let Some(start) = self.playback_start_ms {
            let due = self
                .last_upload_ms
                .is_none_or(|last| ctx.time_ms - last >= MIN_UPLOAD_INTERVAL_MS);
            if due {
                let index = clip.frame_index_at(ctx.time_ms - start, self.looping);
                if index != self.shown_frame {
                    let img = &clip.frames[index].image;
                    quad.update(frame.gpu, img.width(), img.height(), img.as_raw())
                        .map_err(|e| StimulusError::graphics(id, e))?;
                    self.shown_frame = index;
                    self.uploads += 1;
                }
                self.last_upload_ms = Some(ctx.time_ms);
            }
        }

        let dest = dest_rect(ctx, transform, size, quad.size());
        quad.draw(frame.gpu, dest, transform.opacity)
            .map_err(|e| StimulusError::graphics(id, e))
    }

    pub(crate) fn release(&mut self, gpu: &mut dyn Graphics) {
        if let Some(quad) = self.quad.take() {
            quad.release(gpu);
        }
        self.clip = None;
        self.playback_start_ms = None;
        self.last_upload_ms = None;
    }
}
