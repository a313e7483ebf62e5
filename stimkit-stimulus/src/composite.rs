use stimkit_core::{LayerTransform, RenderContext};
use stimkit_resources::{ResourceKind, ResourceManager};

use crate::{Frame, Stimulus, StimulusError};

/// One exclusively owned child of a composite.
#[derive(Debug)]
pub struct Component {
    pub stimulus: Stimulus,
    pub transform: LayerTransform,
    pub layer: i32,
}

/// Children drawn together, in ascending layer order.
#[derive(Debug, Default)]
pub struct CompositeStimulus {
    children: Vec<Component>,
}

impl CompositeStimulus {
    /// Sorts once by layer; equal layers keep their configuration order.
    pub fn new(mut children: Vec<Component>) -> Self {
        children.sort_by_key(|c| c.layer);
        Self { children }
    }

    pub fn children(&self) -> &[Component] {
        &self.children
    }

    pub(crate) fn requirements(&self, out: &mut Vec<(ResourceKind, String)>) {
        for child in &self.children {
            child.stimulus.collect_requirements(out);
        }
    }

    pub(crate) fn preload(&mut self, resources: &mut ResourceManager) {
        for child in &mut self.children {
            child.stimulus.preload(resources);
        }
    }

    pub(crate) fn prepare(&mut self, frame: &mut Frame<'_>, resources: &ResourceManager) -> Result<(), StimulusError> {
        for child in &mut self.children {
            child.stimulus.prepare(frame, resources)?;
        }
        Ok(())
    }

    pub(crate) fn draw(
        &mut self,
        frame: &mut Frame<'_>,
        ctx: &RenderContext,
        transform: &LayerTransform,
    ) -> Result<(), StimulusError> {
        for child in &mut self.children {
            let placed = transform.then(&child.transform);
            child.stimulus.render(frame, ctx, &placed)?;
        }
        Ok(())
    }

    pub(crate) fn release(&mut self, frame: &mut Frame<'_>) {
        for child in &mut self.children {
            child.stimulus.cleanup(frame);
        }
    }
}
