//! Resource Manager: registration, concurrent preload, decoding and caching
//! of every asset a stimulus needs, plus the audio output context.
//!
//! The manager is the only shared mutable state of a session. Stimuli read
//! decoded payloads through its getters and never write back.

pub mod audio;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod resource;
pub mod video;

pub use audio::{AudioBuffer, AudioOutput, SharedAudio, SoftwareMixer, VoiceId, shared_audio};
pub use error::{PlaybackError, ResourceError};
pub use fetch::{Fetcher, FsFetcher, MemoryFetcher};
pub use manager::{PreloadProgress, ResourceManager, ResourceStats};
pub use resource::{Payload, Resource, ResourceId, ResourceKind, ResourceStatus};
pub use video::{VideoClip, VideoFrame};
