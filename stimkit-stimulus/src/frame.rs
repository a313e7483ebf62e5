use stimkit_render::Graphics;
use stimkit_resources::AudioOutput;

/// Output contexts a stimulus may touch while rendering or cleaning up.
pub struct Frame<'a> {
    pub gpu: &'a mut dyn Graphics,
    pub audio: &'a mut dyn AudioOutput,
}

impl<'a> Frame<'a> {
    pub fn new(gpu: &'a mut dyn Graphics, audio: &'a mut dyn AudioOutput) -> Self {
        Self { gpu, audio }
    }
}
