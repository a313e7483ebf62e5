use std::collections::{HashMap, HashSet};

use stimkit_core::{Color, Rect};
use tiny_skia::{BlendMode, FilterQuality, IntSize, Pixmap, PixmapPaint, Transform};

use crate::shader;
use crate::texture::is_power_of_two;
use crate::{
    Graphics, GraphicsError, MinFilter, ProgramId, QuadDraw, ShaderStage, TextureDesc, TextureId,
    VertexArrayId,
};

/// What one `draw_quad` call did, kept for frame diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub texture: TextureId,
    pub program: ProgramId,
    pub dest: Rect,
    pub opacity: f32,
    pub blending: bool,
    pub mip_level: usize,
}

struct SoftTexture {
    desc: TextureDesc,
    levels: Vec<Pixmap>,
}

/// [`Graphics`] on a tiny-skia canvas. The canvas stays opaque, so its
/// premultiplied bytes can be copied straight into an RGBA frame buffer.
pub struct SoftwareGraphics {
    canvas: Pixmap,
    textures: HashMap<TextureId, SoftTexture>,
    programs: HashSet<ProgramId>,
    vertex_arrays: HashSet<VertexArrayId>,
    next_id: u32,
    blending: bool,
    draw_log: Vec<DrawRecord>,
}

impl std::fmt::Debug for SoftwareGraphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareGraphics")
            .field("width", &self.canvas.width())
            .field("height", &self.canvas.height())
            .field("textures", &self.textures.len())
            .field("programs", &self.programs.len())
            .field("vertex_arrays", &self.vertex_arrays.len())
            .field("blending", &self.blending)
            .finish()
    }
}

impl SoftwareGraphics {
    pub fn new(width: u32, height: u32) -> Result<Self, GraphicsError> {
        let mut canvas = Pixmap::new(width, height).ok_or_else(|| {
            GraphicsError::InvalidTexture(format!("canvas size {width}x{height}"))
        })?;
        canvas.fill(tiny_skia::Color::BLACK);
        Ok(Self {
            canvas,
            textures: HashMap::new(),
            programs: HashSet::new(),
            vertex_arrays: HashSet::new(),
            next_id: 1,
            blending: false,
            draw_log: Vec::with_capacity(16),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        let mut canvas = Pixmap::new(width, height).ok_or_else(|| {
            GraphicsError::InvalidTexture(format!("canvas size {width}x{height}"))
        })?;
        canvas.fill(tiny_skia::Color::BLACK);
        self.canvas = canvas;
        Ok(())
    }

    pub fn frame(&self) -> &Pixmap {
        &self.canvas
    }

    /// Copies the canvas into an RGBA8 frame buffer of the same size.
    pub fn copy_frame_into(&self, frame: &mut [u8]) -> bool {
        let data = self.canvas.data();
        if frame.len() != data.len() {
            tracing::warn!(
                frame = frame.len(),
                canvas = data.len(),
                "frame buffer size does not match canvas"
            );
            return false;
        }
        frame.copy_from_slice(data);
        true
    }

    /// Straight RGBA of one canvas pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.canvas.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(&texture).map(|t| t.desc)
    }

    pub fn mip_levels(&self, texture: TextureId) -> usize {
        self.textures.get(&texture).map_or(0, |t| t.levels.len())
    }

    /// Draws issued since the last [`clear`](Graphics::clear).
    pub fn draw_log(&self) -> &[DrawRecord] {
        &self.draw_log
    }

    pub fn take_draw_log(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draw_log)
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Graphics for SoftwareGraphics {
    fn viewport(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn create_texture(&mut self, desc: &TextureDesc, rgba: &[u8]) -> Result<TextureId, GraphicsError> {
        if desc.mipmaps && !(is_power_of_two(desc.width) && is_power_of_two(desc.height)) {
            return Err(GraphicsError::InvalidTexture(format!(
                "mipmaps requested for non-power-of-two {}x{} texture",
                desc.width, desc.height
            )));
        }
        let base = straight_to_pixmap(desc.width, desc.height, rgba)?;
        let levels = if desc.mipmaps {
            build_mips(base)
        } else {
            vec![base]
        };
        let id = TextureId(self.next_id());
        self.textures.insert(id, SoftTexture { desc: *desc, levels });
        Ok(id)
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GraphicsError> {
        let tex = self
            .textures
            .get_mut(&texture)
            .ok_or(GraphicsError::InvalidHandle {
                kind: "texture",
                id: texture.0,
            })?;
        if tex.desc.mipmaps && !(is_power_of_two(width) && is_power_of_two(height)) {
            return Err(GraphicsError::InvalidTexture(format!(
                "mipmapped texture resized to non-power-of-two {width}x{height}"
            )));
        }
        let base = straight_to_pixmap(width, height, rgba)?;
        tex.levels = if tex.desc.mipmaps {
            build_mips(base)
        } else {
            vec![base]
        };
        tex.desc.width = width;
        tex.desc.height = height;
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_none() {
            tracing::debug!(id = texture.0, "delete of unknown texture ignored");
        }
    }

    fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GraphicsError> {
        let vs = shader::compile(ShaderStage::Vertex, vertex_src)?;
        let fs = shader::compile(ShaderStage::Fragment, fragment_src)?;
        shader::link(&vs, &fs)?;
        let id = ProgramId(self.next_id());
        self.programs.insert(id);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, GraphicsError> {
        let id = VertexArrayId(self.next_id());
        self.vertex_arrays.insert(id);
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array);
    }

    fn set_blending(&mut self, enabled: bool) {
        self.blending = enabled;
    }

    fn blending(&self) -> bool {
        self.blending
    }

    fn draw_quad(&mut self, draw: &QuadDraw) -> Result<(), GraphicsError> {
        if !self.programs.contains(&draw.program) {
            return Err(GraphicsError::InvalidHandle {
                kind: "program",
                id: draw.program.0,
            });
        }
        if !self.vertex_arrays.contains(&draw.vertex_array) {
            return Err(GraphicsError::InvalidHandle {
                kind: "vertex array",
                id: draw.vertex_array.0,
            });
        }
        let tex = self
            .textures
            .get(&draw.texture)
            .ok_or(GraphicsError::InvalidHandle {
                kind: "texture",
                id: draw.texture.0,
            })?;
        if draw.dest.width <= 0.0 || draw.dest.height <= 0.0 {
            return Ok(());
        }

        let mip_level = if tex.desc.mipmaps {
            let ratio = (tex.desc.width as f32 / draw.dest.width)
                .max(tex.desc.height as f32 / draw.dest.height);
            if ratio > 1.0 {
                (ratio.log2().floor() as usize).min(tex.levels.len() - 1)
            } else {
                0
            }
        } else {
            0
        };
        let src = &tex.levels[mip_level];
        let paint = PixmapPaint {
            opacity: draw.opacity.clamp(0.0, 1.0),
            blend_mode: if self.blending {
                BlendMode::SourceOver
            } else {
                BlendMode::Source
            },
            quality: match tex.desc.min_filter {
                MinFilter::Nearest => FilterQuality::Nearest,
                MinFilter::Linear | MinFilter::LinearMipmapLinear => FilterQuality::Bilinear,
            },
        };
        let transform = Transform::from_row(
            draw.dest.width / src.width() as f32,
            0.0,
            0.0,
            draw.dest.height / src.height() as f32,
            draw.dest.x,
            draw.dest.y,
        );
        self.canvas
            .draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);

        self.draw_log.push(DrawRecord {
            texture: draw.texture,
            program: draw.program,
            dest: draw.dest,
            opacity: draw.opacity,
            blending: self.blending,
            mip_level,
        });
        Ok(())
    }

    fn clear(&mut self, color: Color) {
        let [r, g, b, _] = color.to_rgba8();
        // Keep the canvas opaque.
        self.canvas.fill(tiny_skia::Color::from_rgba8(r, g, b, 255));
        self.draw_log.clear();
    }
}

fn straight_to_pixmap(width: u32, height: u32, rgba: &[u8]) -> Result<Pixmap, GraphicsError> {
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| GraphicsError::InvalidTexture(format!("size {width}x{height}")))?;
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(GraphicsError::InvalidTexture(format!(
            "expected {expected} bytes for {width}x{height}, got {}",
            rgba.len()
        )));
    }
    let pixels: &[[u8; 4]] = bytemuck::cast_slice(rgba);
    let mut data = Vec::with_capacity(expected);
    for &[r, g, b, a] in pixels {
        let pm = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        data.extend_from_slice(&[pm(r), pm(g), pm(b), a]);
    }
    Pixmap::from_vec(data, size)
        .ok_or_else(|| GraphicsError::InvalidTexture(format!("size {width}x{height}")))
}

fn build_mips(base: Pixmap) -> Vec<Pixmap> {
    let mut levels = vec![base];
    loop {
        let last = &levels[levels.len() - 1];
        if last.width() == 1 && last.height() == 1 {
            break;
        }
        let (w, h) = ((last.width() / 2).max(1), (last.height() / 2).max(1));
        let Some(mut next) = Pixmap::new(w, h) else {
            break;
        };
        let paint = PixmapPaint {
            blend_mode: BlendMode::Source,
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_scale(
            w as f32 / last.width() as f32,
            h as f32 / last.height() as f32,
        );
        next.draw_pixmap(0, 0, last.as_ref(), &paint, transform, None);
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{QUAD_FRAGMENT_SHADER, QUAD_VERTEX_SHADER};

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.iter().copied().cycle().take((w * h * 4) as usize).collect()
    }

    fn pipeline(gpu: &mut SoftwareGraphics) -> (ProgramId, VertexArrayId) {
        (
            gpu.create_program(QUAD_VERTEX_SHADER, QUAD_FRAGMENT_SHADER)
                .unwrap(),
            gpu.create_vertex_array().unwrap(),
        )
    }

    #[test]
    fn power_of_two_textures_get_a_mip_chain() {
        let mut gpu = SoftwareGraphics::new(64, 64).unwrap();
        let tex = gpu
            .create_texture(&TextureDesc::for_size(16, 4), &solid(16, 4, [255; 4]))
            .unwrap();
        // 16x4, 8x2, 4x1, 2x1, 1x1
        assert_eq!(gpu.mip_levels(tex), 5);

        let npot = gpu
            .create_texture(&TextureDesc::for_size(10, 4), &solid(10, 4, [255; 4]))
            .unwrap();
        assert_eq!(gpu.mip_levels(npot), 1);
    }

    #[test]
    fn mipmapped_non_power_of_two_is_rejected() {
        let mut gpu = SoftwareGraphics::new(8, 8).unwrap();
        let desc = TextureDesc {
            width: 10,
            height: 4,
            min_filter: MinFilter::LinearMipmapLinear,
            mipmaps: true,
        };
        assert!(matches!(
            gpu.create_texture(&desc, &solid(10, 4, [0; 4])),
            Err(GraphicsError::InvalidTexture(_))
        ));
    }

    #[test]
    fn wrong_byte_count_is_rejected() {
        let mut gpu = SoftwareGraphics::new(8, 8).unwrap();
        let err = gpu
            .create_texture(&TextureDesc::for_size(2, 2), &[0u8; 15])
            .unwrap_err();
        assert!(err.to_string().contains("expected 16 bytes"));
    }

    #[test]
    fn draw_paints_canvas_and_logs_blend_state() {
        let mut gpu = SoftwareGraphics::new(8, 8).unwrap();
        let (program, vertex_array) = pipeline(&mut gpu);
        let texture = gpu
            .create_texture(&TextureDesc::for_size(2, 2), &solid(2, 2, [255, 0, 0, 255]))
            .unwrap();
        gpu.set_blending(true);
        gpu.draw_quad(&QuadDraw {
            program,
            vertex_array,
            texture,
            dest: Rect::from_xywh(0.0, 0.0, 4.0, 4.0),
            opacity: 1.0,
        })
        .unwrap();
        gpu.set_blending(false);

        assert_eq!(gpu.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(gpu.pixel(6, 6), Some([0, 0, 0, 255]));
        let log = gpu.take_draw_log();
        assert_eq!(log.len(), 1);
        assert!(log[0].blending);
        assert!(!gpu.blending());
    }

    #[test]
    fn clear_starts_a_fresh_draw_log() {
        let mut gpu = SoftwareGraphics::new(8, 8).unwrap();
        let (program, vertex_array) = pipeline(&mut gpu);
        let texture = gpu
            .create_texture(&TextureDesc::for_size(1, 1), &[255, 255, 255, 255])
            .unwrap();
        let draw = QuadDraw {
            program,
            vertex_array,
            texture,
            dest: Rect::from_xywh(0.0, 0.0, 2.0, 2.0),
            opacity: 1.0,
        };
        for _ in 0..100 {
            gpu.clear(Color::BLACK);
            gpu.draw_quad(&draw).unwrap();
            gpu.draw_quad(&draw).unwrap();
        }
        assert_eq!(gpu.draw_log().len(), 2);
        gpu.clear(Color::BLACK);
        assert!(gpu.draw_log().is_empty());
    }

    #[test]
    fn downscaled_draw_samples_a_smaller_mip() {
        let mut gpu = SoftwareGraphics::new(8, 8).unwrap();
        let (program, vertex_array) = pipeline(&mut gpu);
        let texture = gpu
            .create_texture(&TextureDesc::for_size(32, 32), &solid(32, 32, [0, 255, 0, 255]))
            .unwrap();
        gpu.draw_quad(&QuadDraw {
            program,
            vertex_array,
            texture,
            dest: Rect::from_xywh(0.0, 0.0, 8.0, 8.0),
            opacity: 1.0,
        })
        .unwrap();
        assert_eq!(gpu.draw_log()[0].mip_level, 2);
    }

    #[test]
    fn deleted_handles_cannot_draw() {
        let mut gpu = SoftwareGraphics::new(8, 8).unwrap();
        let (program, vertex_array) = pipeline(&mut gpu);
        let texture = gpu
            .create_texture(&TextureDesc::for_size(1, 1), &[1, 2, 3, 4])
            .unwrap();
        gpu.delete_texture(texture);
        gpu.delete_program(program);
        gpu.delete_vertex_array(vertex_array);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_programs(), 0);
        assert_eq!(gpu.live_vertex_arrays(), 0);
        let err = gpu
            .draw_quad(&QuadDraw {
                program,
                vertex_array,
                texture,
                dest: Rect::from_xywh(0.0, 0.0, 1.0, 1.0),
                opacity: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidHandle { kind: "program", .. }));
    }

    #[test]
    fn broken_fragment_shader_fails_program_creation() {
        let mut gpu = SoftwareGraphics::new(8, 8).unwrap();
        let err = gpu
            .create_program(QUAD_VERTEX_SHADER, "out vec4 c; void main( { }")
            .unwrap_err();
        assert!(err.is_program_failure());
        assert_eq!(gpu.live_programs(), 0);
    }
}
