use stimkit_core::{Color, Rect};

use crate::GraphicsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Minification filter of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinFilter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub min_filter: MinFilter,
    pub mipmaps: bool,
}

/// One textured quad, drawn with the blend state currently set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadDraw {
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    pub texture: TextureId,
    pub dest: Rect,
    pub opacity: f32,
}

/// Rendering context handle. Texture data is straight (non-premultiplied)
/// RGBA8, row-major, no padding.
pub trait Graphics {
    fn viewport(&self) -> (u32, u32);

    fn create_texture(&mut self, desc: &TextureDesc, rgba: &[u8]) -> Result<TextureId, GraphicsError>;

    /// Replaces a texture's contents, regenerating mipmaps if it has them.
    fn update_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GraphicsError>;

    fn delete_texture(&mut self, texture: TextureId);

    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GraphicsError>;

    fn delete_program(&mut self, program: ProgramId);

    /// Vertex array holding a unit quad.
    fn create_vertex_array(&mut self) -> Result<VertexArrayId, GraphicsError>;

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    fn set_blending(&mut self, enabled: bool);

    fn blending(&self) -> bool;

    fn draw_quad(&mut self, draw: &QuadDraw) -> Result<(), GraphicsError>;

    fn clear(&mut self, color: Color);
}
