//! Renderable stimuli and the factory that builds them from configuration.
//!
//! Every stimulus follows the same lifecycle: `preload` registers the
//! resources it needs, `prepare` creates its GPU objects once those are
//! loaded, `render` draws one frame, and `cleanup` releases everything.
//! Handles are owned by the stimulus that created them; composites own their
//! children outright.

pub mod audio;
pub mod composite;
pub mod custom;
pub mod error;
pub mod factory;
pub mod frame;
pub mod image;
pub mod quad;
pub mod stimulus;
pub mod text;
pub mod video;

pub use audio::AudioStimulus;
pub use composite::{Component, CompositeStimulus};
pub use custom::{CustomConstructor, CustomStimulus};
pub use error::StimulusError;
pub use factory::{QuestionStimuli, StimulusFactory};
pub use frame::Frame;
pub use image::ImageStimulus;
pub use quad::TexturedQuad;
pub use stimulus::{Lifecycle, Stimulus, StimulusBody};
pub use text::{TextSource, TextStimulus};
pub use video::VideoStimulus;
