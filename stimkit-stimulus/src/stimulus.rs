use stimkit_core::{LayerTransform, Position, RenderContext, Size, StimulusTiming, Transition, Visibility};
use stimkit_resources::{ResourceKind, ResourceManager, ResourceStats, ResourceStatus};

use crate::{
    AudioStimulus, CompositeStimulus, CustomStimulus, Frame, ImageStimulus, StimulusError, TextStimulus,
    VideoStimulus,
};

/// Where a stimulus is in its preload/prepare/render/cleanup cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Constructed,
    /// Resources registered.
    Preloaded,
    /// GPU objects exist.
    Prepared,
}

#[derive(Debug)]
pub enum StimulusBody {
    Text(TextStimulus),
    Image(ImageStimulus),
    Video(VideoStimulus),
    Audio(AudioStimulus),
    Composite(CompositeStimulus),
    Custom {
        handler: String,
        inner: Box<dyn CustomStimulus>,
    },
}

impl StimulusBody {
    pub fn kind(&self) -> &str {
        match self {
            StimulusBody::Text(_) => "text",
            StimulusBody::Image(_) => "image",
            StimulusBody::Video(_) => "video",
            StimulusBody::Audio(_) => "audio",
            StimulusBody::Composite(_) => "composite",
            StimulusBody::Custom { handler, .. } => handler,
        }
    }
}

#[derive(Debug)]
pub struct Stimulus {
    pub id: String,
    pub timing: StimulusTiming,
    pub transition: Option<Transition>,
    pub position: Position,
    /// Explicit on-screen size; the texture's own size otherwise.
    pub size: Option<Size>,
    pub scale: f32,
    pub opacity: f32,
    lifecycle: Lifecycle,
    body: StimulusBody,
}

impl Stimulus {
    pub fn new(id: impl Into<String>, body: StimulusBody) -> Self {
        Self {
            id: id.into(),
            timing: StimulusTiming::default(),
            transition: None,
            position: Position::CENTER,
            size: None,
            scale: 1.0,
            opacity: 1.0,
            lifecycle: Lifecycle::Constructed,
            body,
        }
    }

    pub fn with_timing(mut self, timing: StimulusTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_transition(mut self, transition: Option<Transition>) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_size(mut self, size: Option<Size>) -> Self {
        self.size = size;
        self
    }

    pub fn kind(&self) -> &str {
        self.body.kind()
    }

    pub fn body(&self) -> &StimulusBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut StimulusBody {
        &mut self.body
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_visible_at(&self, time_ms: f64) -> bool {
        self.timing
            .visibility(self.transition.as_ref(), time_ms)
            .is_visible()
    }

    /// Every resource this stimulus and its children read.
    pub fn requirements(&self) -> Vec<(ResourceKind, String)> {
        let mut out = Vec::new();
        self.collect_requirements(&mut out);
        out
    }

    pub(crate) fn collect_requirements(&self, out: &mut Vec<(ResourceKind, String)>) {
        match &self.body {
            StimulusBody::Composite(c) => c.requirements(out),
            _ => self.own_requirements(out),
        }
    }

    fn own_requirements(&self, out: &mut Vec<(ResourceKind, String)>) {
        match &self.body {
            StimulusBody::Text(t) => t.requirements(out),
            StimulusBody::Image(i) => i.requirements(out),
            StimulusBody::Video(v) => v.requirements(out),
            StimulusBody::Audio(a) => a.requirements(out),
            StimulusBody::Composite(_) => {}
            StimulusBody::Custom { inner, .. } => out.extend(inner.requirements()),
        }
    }

    /// Registers needed resources. Loading is left to
    /// [`ResourceManager::preload_all`], batched per page.
    pub fn preload(&mut self, resources: &mut ResourceManager) {
        let mut own = Vec::new();
        self.own_requirements(&mut own);
        for (kind, locator) in own {
            resources.register(kind, &locator);
        }
        if let StimulusBody::Composite(c) = &mut self.body {
            c.preload(resources);
        }
        if self.lifecycle == Lifecycle::Constructed {
            self.lifecycle = Lifecycle::Preloaded;
        }
    }

    /// Registers and loads in one step, for stimuli shown outside a page batch.
    pub async fn preload_and_wait(&mut self, resources: &mut ResourceManager) -> ResourceStats {
        self.preload(resources);
        resources.preload_all(|_| {}).await
    }

    /// First required resource that failed to load, with its reason.
    pub fn failed_resource(&self, resources: &ResourceManager) -> Option<(String, String)> {
        self.requirements().into_iter().find_map(|(_, locator)| {
            (resources.status(&locator) == Some(ResourceStatus::Error)).then(|| {
                let reason = resources.error(&locator).unwrap_or("load failed").to_string();
                (locator, reason)
            })
        })
    }

    /// Creates GPU objects. On failure everything created so far is
    /// released again and the stimulus stays preloaded.
    pub fn prepare(&mut self, frame: &mut Frame<'_>, resources: &ResourceManager) -> Result<(), StimulusError> {
        match self.lifecycle {
            Lifecycle::Prepared => return Ok(()),
            Lifecycle::Constructed => {
                tracing::warn!(stimulus = %self.id, "prepare called before preload");
                return Err(StimulusError::Lifecycle {
                    id: self.id.clone(),
                    operation: "prepare",
                    phase: self.lifecycle,
                });
            }
            Lifecycle::Preloaded => {}
        }

        let id = self.id.as_str();
        let result = match &mut self.body {
            StimulusBody::Text(t) => t.prepare(id, frame.gpu, resources),
            StimulusBody::Image(i) => i.prepare(id, frame.gpu, resources),
            StimulusBody::Video(v) => v.prepare(id, frame.gpu, resources),
            StimulusBody::Audio(a) => a.prepare(id, frame.gpu, resources, self.size),
            StimulusBody::Composite(c) => c.prepare(frame, resources),
            StimulusBody::Custom { inner, .. } => inner.prepare(frame, resources),
        };

        match result {
            Ok(()) => {
                self.lifecycle = Lifecycle::Prepared;
                tracing::debug!(stimulus = %self.id, kind = self.kind(), "stimulus prepared");
                Ok(())
            }
            Err(err) => {
                self.release(frame);
                if err.is_fatal() {
                    tracing::error!(stimulus = %self.id, %err, "stimulus program failed");
                } else {
                    tracing::warn!(stimulus = %self.id, %err, "stimulus could not be prepared");
                }
                Err(err)
            }
        }
    }

    /// Draws one frame if the stimulus is visible at `ctx.time_ms`, placed
    /// inside `parent`. Returns whether it was on screen, which excludes a
    /// frame drawn fully transparent (the first frame of a fade-in).
    ///
    /// Rendering an unprepared stimulus is refused with a warning.
    pub fn render(
        &mut self,
        frame: &mut Frame<'_>,
        ctx: &RenderContext,
        parent: &LayerTransform,
    ) -> Result<bool, StimulusError> {
        if self.lifecycle != Lifecycle::Prepared {
            tracing::warn!(stimulus = %self.id, lifecycle = ?self.lifecycle, "render before prepare ignored");
            return Ok(false);
        }
        let Visibility::Visible { progress } = self.timing.visibility(self.transition.as_ref(), ctx.time_ms) else {
            return Ok(false);
        };

        let ctx = ctx.with_progress(progress);
        let local = parent.then(&LayerTransform::new(
            self.position,
            self.scale,
            self.opacity * ctx.opacity(),
        ));
        let id = self.id.as_str();
        match &mut self.body {
            StimulusBody::Text(t) => t.draw(id, frame, &ctx, &local, self.size)?,
            StimulusBody::Image(i) => i.draw(id, frame, &ctx, &local, self.size)?,
            StimulusBody::Video(v) => v.draw(id, frame, &ctx, &local, self.size)?,
            StimulusBody::Audio(a) => a.draw(id, frame, &ctx, &local, self.size)?,
            StimulusBody::Composite(c) => {
                c.draw(frame, &ctx.shifted(self.timing.delay_ms as f64), &local)?
            }
            StimulusBody::Custom { inner, .. } => inner.render(frame, &ctx, &local)?,
        }
        Ok(local.opacity > 0.0)
    }

    /// Releases every GPU object and stops playback. Safe to call at any
    /// point, any number of times.
    pub fn cleanup(&mut self, frame: &mut Frame<'_>) {
        self.release(frame);
        if self.lifecycle == Lifecycle::Prepared {
            self.lifecycle = Lifecycle::Preloaded;
        }
    }

    fn release(&mut self, frame: &mut Frame<'_>) {
        match &mut self.body {
            StimulusBody::Text(t) => t.release(frame.gpu),
            StimulusBody::Image(i) => i.release(frame.gpu),
            StimulusBody::Video(v) => v.release(frame.gpu),
            StimulusBody::Audio(a) => a.release(frame.gpu, frame.audio),
            StimulusBody::Composite(c) => c.release(frame),
            StimulusBody::Custom { inner, .. } => inner.cleanup(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::{Rgba, RgbaImage};
    use stimkit_core::{TransitionKind, TransitionSpec};
    use stimkit_render::{Graphics, SoftwareGraphics, TextStyle};
    use stimkit_resources::{
        AudioBuffer, MemoryFetcher, Payload, SoftwareMixer, VideoClip, VideoFrame,
    };

    use super::*;
    use crate::{Component, TextSource};

    fn manager() -> ResourceManager {
        let mut rm = ResourceManager::new(MemoryFetcher::new());
        for (id, side) in [("a.png", 2), ("b.png", 4), ("c.png", 8)] {
            let img = RgbaImage::from_pixel(side, side, Rgba([255, 0, 0, 255]));
            rm.insert(id, Payload::Image(Arc::new(img)));
        }
        rm
    }

    fn image(locator: &str) -> Stimulus {
        Stimulus::new(locator, StimulusBody::Image(ImageStimulus::new(locator)))
    }

    fn ctx(time_ms: f64) -> RenderContext {
        RenderContext::new(time_ms, 200, 200)
    }

    #[test]
    fn composite_children_render_in_ascending_layer_order() {
        let rm = &mut manager();
        let children = [("a.png", 2), ("b.png", 0), ("c.png", 1)]
            .into_iter()
            .map(|(locator, layer)| Component {
                stimulus: image(locator),
                transform: LayerTransform::IDENTITY,
                layer,
            })
            .collect();
        let mut composite = Stimulus::new(
            "scene",
            StimulusBody::Composite(CompositeStimulus::new(children)),
        );

        let mut gpu = SoftwareGraphics::new(200, 200).unwrap();
        let mut mixer = SoftwareMixer::default();
        let mut frame = Frame::new(&mut gpu, &mut mixer);
        composite.preload(rm);
        composite.prepare(&mut frame, rm).unwrap();
        for t in [0.0, 16.0] {
            assert!(composite.render(&mut frame, &ctx(t), &LayerTransform::IDENTITY).unwrap());
        }
        drop(frame);

        let widths: Vec<f32> = gpu.draw_log().iter().map(|d| d.dest.width).collect();
        assert_eq!(widths, vec![4.0, 8.0, 2.0, 4.0, 8.0, 2.0]);
    }

    #[test]
    fn text_rasterizes_once_with_the_builtin_font() {
        let rm = &mut manager();
        let mut gpu = SoftwareGraphics::new(400, 200).unwrap();
        let mut mixer = SoftwareMixer::default();
        let mut text = Stimulus::new(
            "prompt",
            StimulusBody::Text(TextStimulus::new(
                TextSource::Inline("Press space".into()),
                TextStyle::default(),
            )),
        );
        text.preload(rm);
        text.prepare(&mut Frame::new(&mut gpu, &mut mixer), rm).unwrap();
        assert_eq!(gpu.live_textures(), 1);

        for t in [0.0, 16.0, 32.0] {
            let mut frame = Frame::new(&mut gpu, &mut mixer);
            assert!(text.render(&mut frame, &ctx(t), &LayerTransform::IDENTITY).unwrap());
        }
        let log = gpu.draw_log();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|d| d.texture == log[0].texture));
        let desc = gpu.texture_desc(log[0].texture).unwrap();
        assert_eq!(log[0].dest.width, desc.width as f32);
        assert!(desc.width > desc.height);

        text.cleanup(&mut Frame::new(&mut gpu, &mut mixer));
        assert_eq!((gpu.live_textures(), gpu.live_programs(), gpu.live_vertex_arrays()), (0, 0, 0));
    }

    #[test]
    fn cleanup_without_prepare_leaves_no_handles() {
        let rm = &mut manager();
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();

        let mut fresh = image("a.png");
        fresh.cleanup(&mut Frame::new(&mut gpu, &mut mixer));
        fresh.cleanup(&mut Frame::new(&mut gpu, &mut mixer));
        assert_eq!(fresh.lifecycle(), Lifecycle::Constructed);

        let mut broken = image("missing.png");
        broken.preload(rm);
        let err = broken
            .prepare(&mut Frame::new(&mut gpu, &mut mixer), rm)
            .unwrap_err();
        assert!(matches!(err, StimulusError::MissingResource { .. }));
        assert!(!err.is_fatal());
        broken.cleanup(&mut Frame::new(&mut gpu, &mut mixer));

        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_programs(), 0);
        assert_eq!(gpu.live_vertex_arrays(), 0);
    }

    #[test]
    fn prepare_then_cleanup_releases_everything() {
        let rm = &mut manager();
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();
        let mut stim = image("b.png");
        stim.preload(rm);
        stim.prepare(&mut Frame::new(&mut gpu, &mut mixer), rm).unwrap();
        assert_eq!(stim.lifecycle(), Lifecycle::Prepared);
        assert_eq!((gpu.live_textures(), gpu.live_programs(), gpu.live_vertex_arrays()), (1, 1, 1));

        stim.cleanup(&mut Frame::new(&mut gpu, &mut mixer));
        stim.cleanup(&mut Frame::new(&mut gpu, &mut mixer));
        assert_eq!(stim.lifecycle(), Lifecycle::Preloaded);
        assert_eq!((gpu.live_textures(), gpu.live_programs(), gpu.live_vertex_arrays()), (0, 0, 0));
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let rm = &mut manager();
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();
        let mut stim = image("a.png");

        let rendered = stim
            .render(&mut Frame::new(&mut gpu, &mut mixer), &ctx(0.0), &LayerTransform::IDENTITY)
            .unwrap();
        assert!(!rendered);
        let err = stim.prepare(&mut Frame::new(&mut gpu, &mut mixer), rm).unwrap_err();
        assert!(matches!(err, StimulusError::Lifecycle { operation: "prepare", .. }));
        assert!(gpu.draw_log().is_empty());
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn blending_is_scoped_to_the_draw_call() {
        let rm = &mut manager();
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();
        let mut stim = image("a.png");
        stim.preload(rm);
        stim.prepare(&mut Frame::new(&mut gpu, &mut mixer), rm).unwrap();
        stim.render(&mut Frame::new(&mut gpu, &mut mixer), &ctx(0.0), &LayerTransform::IDENTITY)
            .unwrap();

        assert!(gpu.draw_log()[0].blending);
        assert!(!gpu.blending());
    }

    #[test]
    fn shader_failure_is_fatal_and_leaks_nothing() {
        let rm = &mut manager();
        rm.insert("bad.frag", Payload::Shader(Arc::from("void main( {")));
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();

        let mut body = ImageStimulus::new("a.png");
        body.shader = Some("bad.frag".into());
        let mut stim = Stimulus::new("shaded", StimulusBody::Image(body));
        stim.preload(rm);
        let err = stim.prepare(&mut Frame::new(&mut gpu, &mut mixer), rm).unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(stim.lifecycle(), Lifecycle::Preloaded);
        assert_eq!((gpu.live_textures(), gpu.live_programs(), gpu.live_vertex_arrays()), (0, 0, 0));
    }

    #[test]
    fn timing_and_fade_drive_visibility_and_opacity() {
        let rm = &mut manager();
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();
        let fade = TransitionSpec {
            kind: TransitionKind::Fade,
            duration_ms: 100,
        };
        let mut stim = image("a.png")
            .with_timing(StimulusTiming::new(100, Some(500)))
            .with_transition(Some(Transition {
                enter: Some(fade),
                exit: None,
            }));
        stim.preload(rm);
        stim.prepare(&mut Frame::new(&mut gpu, &mut mixer), rm).unwrap();

        let mut at = |t: f64| {
            stim.render(&mut Frame::new(&mut gpu, &mut mixer), &ctx(t), &LayerTransform::IDENTITY)
                .unwrap()
        };
        assert!(!at(50.0));
        assert!(at(150.0));
        assert!(at(300.0));
        assert!(!at(600.0));

        let opacities: Vec<f32> = gpu.draw_log().iter().map(|d| d.opacity).collect();
        assert_eq!(opacities, vec![0.5, 1.0]);

        // first fade-in frame is drawn transparent and does not count as shown
        let shown = stim
            .render(&mut Frame::new(&mut gpu, &mut mixer), &ctx(100.0), &LayerTransform::IDENTITY)
            .unwrap();
        assert!(!shown);
        assert_eq!(gpu.draw_log().last().map(|d| d.opacity), Some(0.0));
    }

    #[test]
    fn video_texture_updates_are_rate_limited() {
        let mut rm = ResourceManager::new(MemoryFetcher::new());
        let frames = (0..8)
            .map(|i| VideoFrame {
                image: RgbaImage::from_pixel(4, 4, Rgba([i * 30, 0, 0, 255])),
                start_ms: i as f64 * 5.0,
                duration_ms: 5.0,
            })
            .collect();
        let clip = VideoClip {
            width: 4,
            height: 4,
            frames,
        };
        rm.insert("clip.gif", Payload::Video(Arc::new(clip)));

        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();
        let mut stim = Stimulus::new("clip", StimulusBody::Video(VideoStimulus::new("clip.gif")));
        stim.preload(&mut rm);
        stim.prepare(&mut Frame::new(&mut gpu, &mut mixer), &rm).unwrap();
        for t in 0..=40 {
            stim.render(
                &mut Frame::new(&mut gpu, &mut mixer),
                &ctx(t as f64),
                &LayerTransform::IDENTITY,
            )
            .unwrap();
        }

        let StimulusBody::Video(video) = stim.body() else {
            panic!("expected video body");
        };
        assert!(video.is_playing());
        assert_eq!(video.texture_uploads(), 2);
        assert_eq!(gpu.draw_log().len(), 41);
    }

    #[test]
    fn audio_starts_once_and_stops_on_cleanup() {
        let mut rm = ResourceManager::new(MemoryFetcher::new());
        let buffer = AudioBuffer {
            sample_rate: 48_000,
            channels: 1,
            samples: vec![0.25; 4800],
        };
        rm.insert("beep.wav", Payload::Audio(Arc::new(buffer)));

        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut mixer = SoftwareMixer::default();
        let mut stim = Stimulus::new("beep", StimulusBody::Audio(AudioStimulus::new("beep.wav")));
        stim.preload(&mut rm);
        stim.prepare(&mut Frame::new(&mut gpu, &mut mixer), &rm).unwrap();
        for t in [0.0, 16.0, 32.0] {
            stim.render(&mut Frame::new(&mut gpu, &mut mixer), &ctx(t), &LayerTransform::IDENTITY)
                .unwrap();
        }
        assert_eq!(mixer.active_voices(), 1);

        stim.cleanup(&mut Frame::new(&mut gpu, &mut mixer));
        assert_eq!(mixer.active_voices(), 0);
        stim.cleanup(&mut Frame::new(&mut gpu, &mut mixer));
    }

    #[tokio::test]
    async fn failed_resources_are_reported() {
        let mut rm = ResourceManager::new(MemoryFetcher::new());
        let mut stim = image("gone.png");
        let stats = stim.preload_and_wait(&mut rm).await;
        assert_eq!(stats.errors, 1);
        let (locator, reason) = stim.failed_resource(&rm).unwrap();
        assert_eq!(locator, "gone.png");
        assert!(reason.contains("not found"));
    }
}
