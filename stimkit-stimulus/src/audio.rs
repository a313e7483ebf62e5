use std::sync::Arc;

use stimkit_core::{Color, LayerTransform, RenderContext, Size};
use stimkit_render::{Graphics, pixmap_to_rgba, rasterize_waveform, waveform_peaks};
use stimkit_resources::{AudioBuffer, AudioOutput, PlaybackError, ResourceKind, ResourceManager, VoiceId};

use crate::text::dest_rect;
use crate::{Frame, StimulusError, TexturedQuad};

const WAVEFORM_SIZE: (u32, u32) = (400, 100);

/// Plays a preloaded buffer once, on the first frame it is visible.
#[derive(Debug)]
pub struct AudioStimulus {
    pub locator: String,
    pub volume: f32,
    pub show_waveform: bool,
    pub waveform_color: Color,
    buffer: Option<Arc<AudioBuffer>>,
    voice: Option<VoiceId>,
    started: bool,
    waveform: Option<TexturedQuad>,
}

impl AudioStimulus {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            volume: 1.0,
            show_waveform: false,
            waveform_color: Color::WHITE,
            buffer: None,
            voice: None,
            started: false,
            waveform: None,
        }
    }

    pub fn voice(&self) -> Option<VoiceId> {
        self.voice
    }

    pub(crate) fn requirements(&self, out: &mut Vec<(ResourceKind, String)>) {
        out.push((ResourceKind::Audio, self.locator.clone()));
    }

    pub(crate) fn prepare(
        &mut self,
        id: &str,
        gpu: &mut dyn Graphics,
        resources: &ResourceManager,
        size: Option<Size>,
    ) -> Result<(), StimulusError> {
        let buffer = resources
            .get_audio_buffer(&self.locator)
            .ok_or_else(|| StimulusError::missing(id, &self.locator, resources.error(&self.locator)))?;

        if self.show_waveform {
            let (w, h) = size
                .map(|s| (s.width.max(1.0) as u32, s.height.max(1.0) as u32))
                .unwrap_or(WAVEFORM_SIZE);
            let peaks = waveform_peaks(&buffer.samples, buffer.channels, w as usize);
            let pixmap = rasterize_waveform(&peaks, w, h, self.waveform_color)
                .map_err(|e| StimulusError::graphics(id, e))?;
            let quad = TexturedQuad::create(gpu, w, h, &pixmap_to_rgba(&pixmap), None)
                .map_err(|e| StimulusError::graphics(id, e))?;
            self.waveform = Some(quad);
        }
        self.buffer = Some(buffer);
        self.started = false;
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
        if !self.started {
            self.started = true;
            if let Some(buffer) = &self.buffer {
                match frame.audio.play(Arc::clone(buffer), self.volume) {
                    Ok(voice) => self.voice = Some(voice),
                    Err(err) => tracing::warn!(stimulus = id, %err, "audio playback rejected"),
                }
            }
        }

        let Some(quad) = &self.waveform else {
            return Ok(());
        };
        let dest = dest_rect(ctx, transform, size, quad.size());
        quad.draw(frame.gpu, dest, transform.opacity)
            .map_err(|e| StimulusError::graphics(id, e))
    }

    pub(crate) fn release(&mut self, gpu: &mut dyn Graphics, audio: &mut dyn AudioOutput) {
        if let Some(voice) = self.voice.take() {
            match audio.stop(voice) {
                Ok(()) | Err(PlaybackError::AlreadyStopped(_)) | Err(PlaybackError::ContextClosed) => {}
                Err(err) => tracing::debug!(%err, "stopping audio failed"),
            }
        }
        if let Some(quad) = self.waveform.take() {
            quad.release(gpu);
        }
        self.buffer = None;
        self.started = false;
    }
}
