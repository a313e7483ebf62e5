use stimkit_core::{LayerTransform, RenderContext, StimulusConfig};
use stimkit_resources::{ResourceKind, ResourceManager};

use crate::{Frame, StimulusError};

/// Extension point for stimulus types registered with the factory.
///
/// The surrounding [`Stimulus`](crate::Stimulus) enforces the lifecycle
/// order, so implementations only see `render` after a successful `prepare`.
pub trait CustomStimulus: Send + std::fmt::Debug {
    fn requirements(&self) -> Vec<(ResourceKind, String)> {
        Vec::new()
    }

    fn prepare(&mut self, frame: &mut Frame<'_>, resources: &ResourceManager) -> Result<(), StimulusError>;

    fn render(
        &mut self,
        frame: &mut Frame<'_>,
        ctx: &RenderContext,
        transform: &LayerTransform,
    ) -> Result<(), StimulusError>;

    /// Must tolerate being called without a prior `prepare`, and after a
    /// `prepare` that failed halfway.
    fn cleanup(&mut self, frame: &mut Frame<'_>);
}

pub type CustomConstructor =
    Box<dyn Fn(&StimulusConfig) -> Result<Box<dyn CustomStimulus>, StimulusError> + Send + Sync>;
