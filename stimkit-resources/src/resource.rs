use std::sync::Arc;

use ab_glyph::FontArc;
use image::RgbaImage;
pub use string_cache::DefaultAtom as Atom;

use crate::{AudioBuffer, VideoClip};

/// Registration id of a resource, interned. Usually the source locator.
pub type ResourceId = Atom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Video,
    Audio,
    Font,
    Text,
    Json,
    Shader,
}

impl ResourceKind {
    /// Guesses a kind from the locator's file extension.
    pub fn from_locator(locator: &str) -> Option<Self> {
        let path = locator.split(['?', '#']).next().unwrap_or(locator);
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        Some(match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" | "webp" => ResourceKind::Image,
            "gif" => ResourceKind::Video,
            "wav" => ResourceKind::Audio,
            "ttf" | "otf" => ResourceKind::Font,
            "txt" | "md" => ResourceKind::Text,
            "json" => ResourceKind::Json,
            "glsl" | "frag" | "vert" => ResourceKind::Shader,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
            ResourceKind::Audio => "audio",
            ResourceKind::Font => "font",
            ResourceKind::Text => "text",
            ResourceKind::Json => "json",
            ResourceKind::Shader => "shader",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Pending,
    Loading,
    Loaded,
    Error,
}

/// Decoded, ready-to-use form of a resource.
#[derive(Clone)]
pub enum Payload {
    Image(Arc<RgbaImage>),
    Video(Arc<VideoClip>),
    Audio(Arc<AudioBuffer>),
    Font(FontArc),
    Text(Arc<str>),
    Json(Arc<serde_json::Value>),
    Shader(Arc<str>),
}

impl Payload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Payload::Image(_) => ResourceKind::Image,
            Payload::Video(_) => ResourceKind::Video,
            Payload::Audio(_) => ResourceKind::Audio,
            Payload::Font(_) => ResourceKind::Font,
            Payload::Text(_) => ResourceKind::Text,
            Payload::Json(_) => ResourceKind::Json,
            Payload::Shader(_) => ResourceKind::Shader,
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Image(img) => write!(f, "Image({}x{})", img.width(), img.height()),
            Payload::Video(clip) => write!(f, "Video({} frames)", clip.frames.len()),
            Payload::Audio(buf) => write!(f, "Audio({} ms)", buf.duration_ms()),
            Payload::Font(_) => f.write_str("Font"),
            Payload::Text(t) => write!(f, "Text({} bytes)", t.len()),
            Payload::Json(_) => f.write_str("Json"),
            Payload::Shader(s) => write!(f, "Shader({} bytes)", s.len()),
        }
    }
}

/// One tracked asset. Only the manager mutates it.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    pub locator: String,
    pub kind: ResourceKind,
    pub status: ResourceStatus,
    pub(crate) payload: Option<Payload>,
    pub error: Option<String>,
}

impl Resource {
    pub(crate) fn new(id: ResourceId, kind: ResourceKind, locator: String) -> Self {
        Self {
            id,
            locator,
            kind,
            status: ResourceStatus::Pending,
            payload: None,
            error: None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(ResourceKind::from_locator("a/b/face.PNG"), Some(ResourceKind::Image));
        assert_eq!(
            ResourceKind::from_locator("clip.gif?v=2"),
            Some(ResourceKind::Video)
        );
        assert_eq!(ResourceKind::from_locator("beep.wav"), Some(ResourceKind::Audio));
        assert_eq!(ResourceKind::from_locator("noext"), None);
    }
}
