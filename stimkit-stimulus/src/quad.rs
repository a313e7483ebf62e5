use stimkit_core::Rect;
use stimkit_render::shader::{QUAD_FRAGMENT_SHADER, QUAD_VERTEX_SHADER};
use stimkit_render::{Graphics, GraphicsError, ProgramId, QuadDraw, TextureId, VertexArrayId, upload_rgba};

/// Program, unit-quad vertex array and texture of one textured stimulus.
#[derive(Debug)]
pub struct TexturedQuad {
    program: ProgramId,
    vertex_array: VertexArrayId,
    texture: TextureId,
    width: u32,
    height: u32,
}

impl TexturedQuad {
    /// Creates all three objects, or none of them. The program comes first so
    /// that a bad fragment shader never leaves a texture behind.
    pub fn create(
        gpu: &mut dyn Graphics,
        width: u32,
        height: u32,
        rgba: &[u8],
        fragment_src: Option<&str>,
    ) -> Result<Self, GraphicsError> {
        let program = gpu.create_program(QUAD_VERTEX_SHADER, fragment_src.unwrap_or(QUAD_FRAGMENT_SHADER))?;
        let vertex_array = match gpu.create_vertex_array() {
            Ok(va) => va,
            Err(err) => {
                gpu.delete_program(program);
                return Err(err);
            }
        };
        let texture = match upload_rgba(gpu, width, height, rgba) {
            Ok(tex) => tex,
            Err(err) => {
                gpu.delete_vertex_array(vertex_array);
                gpu.delete_program(program);
                return Err(err);
            }
        };
        Ok(Self {
            program,
            vertex_array,
            texture,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn update(&mut self, gpu: &mut dyn Graphics, width: u32, height: u32, rgba: &[u8]) -> Result<(), GraphicsError> {
        gpu.update_texture(self.texture, width, height, rgba)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Draws with blending switched on for this call only.
    pub fn draw(&self, gpu: &mut dyn Graphics, dest: Rect, opacity: f32) -> Result<(), GraphicsError> {
        draw_blended(
            gpu,
            &QuadDraw {
                program: self.program,
                vertex_array: self.vertex_array,
                texture: self.texture,
                dest,
                opacity,
            },
        )
    }

    pub fn release(self, gpu: &mut dyn Graphics) {
        gpu.delete_texture(self.texture);
        gpu.delete_vertex_array(self.vertex_array);
        gpu.delete_program(self.program);
    }
}

/// Draws one quad with blending switched on for this call only.
pub fn draw_blended(gpu: &mut dyn Graphics, draw: &QuadDraw) -> Result<(), GraphicsError> {
    gpu.set_blending(true);
    let result = gpu.draw_quad(draw);
    gpu.set_blending(false);
    result
}
