use std::sync::Arc;

use image::RgbaImage;
use stimkit_core::{Color, Position, Rect, Size};
use stimkit_render::shader::{QUAD_FRAGMENT_SHADER, QUAD_VERTEX_SHADER};
use stimkit_render::{Graphics, GraphicsError, ProgramId, QuadDraw, VertexArrayId, fixation_cross, pixmap_to_rgba};
use stimkit_resources::{Payload, ResourceManager};
use stimkit_stimulus::quad::draw_blended;

/// Resource id of the generated cross image.
pub const FIXATION_RESOURCE: &str = "stimkit:fixation";

/// Centered fixation cross. The image lives in the resource manager and is
/// uploaded through its texture cache on first draw.
#[derive(Debug)]
pub struct FixationMarker {
    size: u32,
    objects: Option<(ProgramId, VertexArrayId)>,
}

impl FixationMarker {
    /// Rasterizes the cross and registers it as a loaded image.
    pub fn install(
        resources: &mut ResourceManager,
        size: u32,
        thickness: f32,
        color: Color,
    ) -> Result<Self, GraphicsError> {
        let size = size.max(1);
        let pixmap = fixation_cross(size, thickness, color)?;
        let image = RgbaImage::from_raw(size, size, pixmap_to_rgba(&pixmap))
            .ok_or_else(|| GraphicsError::InvalidTexture(format!("fixation cross {size}x{size}")))?;
        resources.insert(FIXATION_RESOURCE, Payload::Image(Arc::new(image)));
        Ok(Self { size, objects: None })
    }

    pub fn draw(&mut self, gpu: &mut dyn Graphics, resources: &mut ResourceManager) -> Result<(), GraphicsError> {
        let Some(texture) = resources.upload_texture(gpu, FIXATION_RESOURCE)? else {
            tracing::warn!("fixation image missing from resources");
            return Ok(());
        };
        let (program, vertex_array) = match self.objects {
            Some(objects) => objects,
            None => {
                let program = gpu.create_program(QUAD_VERTEX_SHADER, QUAD_FRAGMENT_SHADER)?;
                let vertex_array = match gpu.create_vertex_array() {
                    Ok(va) => va,
                    Err(err) => {
                        gpu.delete_program(program);
                        return Err(err);
                    }
                };
                self.objects = Some((program, vertex_array));
                (program, vertex_array)
            }
        };
        let (width, height) = gpu.viewport();
        let extent = self.size as f32;
        draw_blended(
            gpu,
            &QuadDraw {
                program,
                vertex_array,
                texture,
                dest: Rect::centered(Position::CENTER, Size::new(extent, extent), width, height),
                opacity: 1.0,
            },
        )
    }

    /// The texture itself belongs to the resource manager's cache.
    pub fn release(&mut self, gpu: &mut dyn Graphics) {
        if let Some((program, vertex_array)) = self.objects.take() {
            gpu.delete_vertex_array(vertex_array);
            gpu.delete_program(program);
        }
    }
}

#[cfg(test)]
mod tests {
    use stimkit_render::SoftwareGraphics;
    use stimkit_resources::{MemoryFetcher, ResourceStatus};

    use super::*;

    #[test]
    fn cross_is_cached_once() {
        let mut gpu = SoftwareGraphics::new(100, 100).unwrap();
        let mut rm = ResourceManager::new(MemoryFetcher::new());
        let mut marker = FixationMarker::install(&mut rm, 20, 4.0, Color::WHITE).unwrap();
        assert_eq!(rm.status(FIXATION_RESOURCE), Some(ResourceStatus::Loaded));

        marker.draw(&mut gpu, &mut rm).unwrap();
        marker.draw(&mut gpu, &mut rm).unwrap();
        assert_eq!(gpu.live_textures(), 1);
        assert!(rm.get_texture(FIXATION_RESOURCE).is_some());
        assert_eq!(gpu.draw_log().len(), 2);
        assert!(!gpu.blending());
        // bar crossing the viewport center
        assert_eq!(gpu.pixel(50, 50), Some([255, 255, 255, 255]));

        marker.release(&mut gpu);
        rm.dispose(&mut gpu);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_programs(), 0);
        assert_eq!(gpu.live_vertex_arrays(), 0);
    }
}
