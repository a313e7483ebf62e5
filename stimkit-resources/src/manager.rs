use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, MutexGuard, PoisonError};

use ab_glyph::FontArc;
use image::RgbaImage;
use stimkit_render::{Graphics, GraphicsError, TextureId, builtin_font, upload_rgba};
use tokio::task::JoinSet;

use crate::decode::decode;
use crate::{
    AudioBuffer, AudioOutput, Fetcher, Payload, Resource, ResourceError, ResourceId, ResourceKind,
    ResourceStatus, SharedAudio, SoftwareMixer, VideoClip, shared_audio,
};

/// Snapshot handed to the preload progress callback after each completion.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadProgress {
    pub total: usize,
    pub loaded: usize,
    pub percentage: f32,
    pub current_resource: Option<ResourceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceStats {
    pub total: usize,
    pub loaded: usize,
    pub errors: usize,
}

/// Registry of every asset of a session.
///
/// `preload_all` fetches and decodes concurrently on blocking workers; all
/// bookkeeping happens on the caller's task, so a resource is only ever
/// written by the manager itself.
#[derive(Debug)]
pub struct ResourceManager {
    resources: HashMap<ResourceId, Resource>,
    order: Vec<ResourceId>,
    fetcher: Arc<dyn Fetcher>,
    textures: HashMap<ResourceId, TextureId>,
    audio: SharedAudio,
}

impl ResourceManager {
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self::with_audio_output(fetcher, shared_audio(SoftwareMixer::default()))
    }

    /// `audio` is shared with whatever pumps samples to the device.
    pub fn with_audio_output(fetcher: impl Fetcher + 'static, audio: SharedAudio) -> Self {
        Self {
            resources: HashMap::new(),
            order: Vec::new(),
            fetcher: Arc::new(fetcher),
            textures: HashMap::new(),
            audio,
        }
    }

    /// Registers an asset. Registering an existing id is a no-op.
    pub fn register_resource(
        &mut self,
        id: impl Into<ResourceId>,
        kind: ResourceKind,
        locator: impl Into<String>,
    ) -> ResourceId {
        let id = id.into();
        if let Some(existing) = self.resources.get(&id) {
            if existing.kind != kind {
                tracing::debug!(%id, registered = %existing.kind, requested = %kind, "resource already registered with another kind");
            }
            return id;
        }
        let mut audio = self.lock_audio();
        if audio.is_closed() {
            audio.reset();
        }
        drop(audio);
        self.resources
            .insert(id.clone(), Resource::new(id.clone(), kind, locator.into()));
        self.order.push(id.clone());
        id
    }

    /// Shorthand for assets identified by their locator.
    pub fn register(&mut self, kind: ResourceKind, locator: &str) -> ResourceId {
        self.register_resource(locator, kind, locator)
    }

    /// Adds an already-decoded asset, e.g. one generated at runtime.
    pub fn insert(&mut self, id: impl Into<ResourceId>, payload: Payload) -> ResourceId {
        let id = id.into();
        let mut resource = Resource::new(id.clone(), payload.kind(), String::new());
        resource.status = ResourceStatus::Loaded;
        resource.payload = Some(payload);
        if self.resources.insert(id.clone(), resource).is_none() {
            self.order.push(id.clone());
        }
        id
    }

    /// Loads every pending resource concurrently. Individual failures mark
    /// only that resource as errored; this never fails as a whole.
    ///
    /// Entries left in `Loading` by an interrupted earlier call are retried.
    pub async fn preload_all(&mut self, mut on_progress: impl FnMut(&PreloadProgress)) -> ResourceStats {
        let batch: Vec<(ResourceId, ResourceKind, String)> = self
            .order
            .iter()
            .filter_map(|id| self.resources.get(id))
            .filter(|r| matches!(r.status, ResourceStatus::Pending | ResourceStatus::Loading))
            .map(|r| (r.id.clone(), r.kind, r.locator.clone()))
            .collect();

        let total = batch.len();
        if total == 0 {
            return self.stats();
        }
        tracing::info!(total, "preloading resources");

        let mut tasks = JoinSet::new();
        for (id, kind, locator) in &batch {
            if let Some(r) = self.resources.get_mut(id) {
                r.status = ResourceStatus::Loading;
            }
            let fetcher = Arc::clone(&self.fetcher);
            let (id, kind, locator) = (id.clone(), *kind, locator.clone());
            tasks.spawn_blocking(move || {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    fetcher.fetch(&locator).and_then(|bytes| decode(kind, &bytes))
                }))
                .unwrap_or_else(|_| Err(ResourceError::decode(kind, "decoder panicked")));
                (id, result)
            });
        }

        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            let (id, result) = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(%err, "resource load task failed");
                    continue;
                }
            };
            self.finish(&id, result);
            done += 1;
            on_progress(&PreloadProgress {
                total,
                loaded: done,
                percentage: done as f32 / total as f32 * 100.0,
                current_resource: Some(id),
            });
        }

        for (id, _, locator) in &batch {
            if self.status(id) == Some(ResourceStatus::Loading) {
                self.finish(id, Err(ResourceError::Abandoned(locator.clone())));
            }
        }

        let stats = self.stats();
        tracing::info!(loaded = stats.loaded, errors = stats.errors, "preload finished");
        stats
    }

    fn finish(&mut self, id: &ResourceId, result: Result<Payload, ResourceError>) {
        let Some(resource) = self.resources.get_mut(id) else {
            return;
        };
        let result = result.and_then(|payload| {
            if payload.kind() == resource.kind {
                Ok(payload)
            } else {
                Err(ResourceError::KindMismatch {
                    expected: resource.kind,
                    found: payload.kind(),
                })
            }
        });
        match result {
            Ok(payload) => {
                resource.status = ResourceStatus::Loaded;
                resource.payload = Some(payload);
                resource.error = None;
                tracing::debug!(%id, kind = %resource.kind, "resource loaded");
            }
            Err(err) => {
                tracing::warn!(%id, locator = %resource.locator, %err, "resource failed to load");
                resource.status = ResourceStatus::Error;
                resource.payload = None;
                resource.error = Some(err.to_string());
            }
        }
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(&ResourceId::from(id))
    }

    pub fn status(&self, id: &str) -> Option<ResourceStatus> {
        self.resource(id).map(|r| r.status)
    }

    /// Failure reason of an errored resource.
    pub fn error(&self, id: &str) -> Option<&str> {
        self.resource(id).and_then(|r| r.error.as_deref())
    }

    pub fn get_data(&self, id: &str) -> Option<&Payload> {
        self.resource(id)
            .filter(|r| r.status == ResourceStatus::Loaded)
            .and_then(Resource::payload)
    }

    pub fn get_image(&self, id: &str) -> Option<Arc<RgbaImage>> {
        match self.get_data(id)? {
            Payload::Image(img) => Some(Arc::clone(img)),
            _ => None,
        }
    }

    pub fn get_video(&self, id: &str) -> Option<Arc<VideoClip>> {
        match self.get_data(id)? {
            Payload::Video(clip) => Some(Arc::clone(clip)),
            _ => None,
        }
    }

    pub fn get_audio_buffer(&self, id: &str) -> Option<Arc<AudioBuffer>> {
        match self.get_data(id)? {
            Payload::Audio(buf) => Some(Arc::clone(buf)),
            _ => None,
        }
    }

    pub fn get_font(&self, id: &str) -> Option<FontArc> {
        match self.get_data(id)? {
            Payload::Font(font) => Some(font.clone()),
            _ => None,
        }
    }

    /// Text or shader source.
    pub fn get_text(&self, id: &str) -> Option<Arc<str>> {
        match self.get_data(id)? {
            Payload::Text(s) | Payload::Shader(s) => Some(Arc::clone(s)),
            _ => None,
        }
    }

    pub fn get_json(&self, id: &str) -> Option<Arc<serde_json::Value>> {
        match self.get_data(id)? {
            Payload::Json(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    /// First loaded font in registration order, else the built-in face.
    pub fn default_font(&self) -> Option<FontArc> {
        self.order.iter().find_map(|id| self.get_font(id)).or_else(|| {
            builtin_font()
                .inspect_err(|err| tracing::warn!(%err, "built-in font unusable"))
                .ok()
        })
    }

    /// Uploads a loaded image once and hands out the cached texture afterwards.
    /// Returns `None` when the image is not loaded.
    pub fn upload_texture(
        &mut self,
        gpu: &mut dyn Graphics,
        id: &str,
    ) -> Result<Option<TextureId>, GraphicsError> {
        let key = ResourceId::from(id);
        if let Some(&tex) = self.textures.get(&key) {
            return Ok(Some(tex));
        }
        let Some(img) = self.get_image(id) else {
            return Ok(None);
        };
        let tex = upload_rgba(gpu, img.width(), img.height(), img.as_raw())?;
        self.textures.insert(key, tex);
        Ok(Some(tex))
    }

    pub fn get_texture(&self, id: &str) -> Option<TextureId> {
        self.textures.get(&ResourceId::from(id)).copied()
    }

    pub fn audio_output(&self) -> SharedAudio {
        Arc::clone(&self.audio)
    }

    fn lock_audio(&self) -> MutexGuard<'_, dyn AudioOutput + 'static> {
        self.audio.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> ResourceStats {
        let mut stats = ResourceStats {
            total: self.resources.len(),
            ..Default::default()
        };
        for r in self.resources.values() {
            match r.status {
                ResourceStatus::Loaded => stats.loaded += 1,
                ResourceStatus::Error => stats.errors += 1,
                _ => {}
            }
        }
        stats
    }

    /// Errored resources with their reasons, in registration order.
    pub fn errors(&self) -> Vec<(ResourceId, String)> {
        self.order
            .iter()
            .filter_map(|id| self.resources.get(id))
            .filter_map(|r| r.error.clone().map(|e| (r.id.clone(), e)))
            .collect()
    }

    /// Releases cached textures, stops all audio and forgets every resource.
    /// Safe to call repeatedly.
    pub fn dispose(&mut self, gpu: &mut dyn Graphics) {
        for (_, tex) in self.textures.drain() {
            gpu.delete_texture(tex);
        }
        let mut audio = self.lock_audio();
        if !audio.is_closed() {
            audio.close();
        }
        drop(audio);
        self.resources.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFetcher;
    use stimkit_render::SoftwareGraphics;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, image::Rgba([200, 0, 0, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn builtin_font_stands_in_without_font_resources() {
        use ab_glyph::Font;

        let rm = ResourceManager::new(MemoryFetcher::new());
        let font = rm.default_font().unwrap();
        assert_ne!(font.glyph_id('A').0, 0);
    }

    #[tokio::test]
    async fn partial_failures_are_isolated() {
        let fetcher = MemoryFetcher::new()
            .with("a.png", png(4, 4))
            .with("b.png", png(2, 2))
            .with("broken.png", b"garbage".to_vec())
            .with("notes.txt", b"hello".to_vec());
        let mut rm = ResourceManager::new(fetcher);
        for locator in ["a.png", "b.png", "broken.png", "missing.png"] {
            rm.register(ResourceKind::Image, locator);
        }
        rm.register(ResourceKind::Text, "notes.txt");

        let mut updates = Vec::new();
        let stats = rm.preload_all(|p| updates.push(p.clone())).await;

        assert_eq!(stats, ResourceStats { total: 5, loaded: 3, errors: 2 });
        assert_eq!(updates.len(), 5);
        assert_eq!(updates.last().unwrap().percentage, 100.0);
        assert!(updates.windows(2).all(|w| w[0].loaded < w[1].loaded));

        assert_eq!(rm.status("broken.png"), Some(ResourceStatus::Error));
        assert!(rm.error("missing.png").unwrap().contains("not found"));
        assert!(rm.get_image("missing.png").is_none());
        assert_eq!(rm.get_image("a.png").unwrap().dimensions(), (4, 4));
        assert_eq!(&*rm.get_text("notes.txt").unwrap(), "hello");
        assert_eq!(rm.errors().len(), 2);
    }

    #[tokio::test]
    async fn kind_mismatch_is_an_error() {
        let mut rm = ResourceManager::new(MemoryFetcher::new().with("x", png(1, 1)));
        rm.register(ResourceKind::Audio, "x");
        let stats = rm.preload_all(|_| {}).await;
        assert_eq!(stats.errors, 1);
        assert!(rm.get_audio_buffer("x").is_none());
    }

    #[tokio::test]
    async fn registration_is_idempotent_and_loading_entries_are_retried() {
        let mut rm = ResourceManager::new(MemoryFetcher::new().with("a.png", png(1, 1)));
        rm.register(ResourceKind::Image, "a.png");
        rm.register(ResourceKind::Image, "a.png");
        assert_eq!(rm.stats().total, 1);

        rm.resources.get_mut(&ResourceId::from("a.png")).unwrap().status = ResourceStatus::Loading;
        let stats = rm.preload_all(|_| {}).await;
        assert_eq!(stats.loaded, 1);

        let mut calls = 0;
        rm.preload_all(|_| calls += 1).await;
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn getters_do_not_block_before_preload() {
        let mut rm = ResourceManager::new(MemoryFetcher::new().with("a.png", png(1, 1)));
        rm.register(ResourceKind::Image, "a.png");
        assert_eq!(rm.status("a.png"), Some(ResourceStatus::Pending));
        assert!(rm.get_image("a.png").is_none());
        assert!(rm.get_image("unknown").is_none());
    }

    #[tokio::test]
    async fn texture_cache_and_dispose() {
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let mut rm = ResourceManager::new(MemoryFetcher::new().with("a.png", png(8, 8)));
        rm.register(ResourceKind::Image, "a.png");
        rm.preload_all(|_| {}).await;

        let first = rm.upload_texture(&mut gpu, "a.png").unwrap().unwrap();
        let second = rm.upload_texture(&mut gpu, "a.png").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(gpu.live_textures(), 1);
        assert_eq!(rm.get_texture("a.png"), Some(first));

        rm.dispose(&mut gpu);
        rm.dispose(&mut gpu);
        assert_eq!(gpu.live_textures(), 0);
        assert!(rm.audio_output().lock().unwrap().is_closed());
        assert_eq!(rm.stats().total, 0);

        rm.register(ResourceKind::Image, "a.png");
        assert!(!rm.audio_output().lock().unwrap().is_closed());
    }

    #[test]
    fn inserted_payloads_are_loaded() {
        let mut rm = ResourceManager::new(MemoryFetcher::new());
        rm.insert("fixation", Payload::Image(Arc::new(RgbaImage::new(2, 2))));
        assert_eq!(rm.status("fixation"), Some(ResourceStatus::Loaded));
        assert!(rm.get_image("fixation").is_some());
    }
}
