use tiny_skia::Pixmap;

use crate::{Graphics, GraphicsError, MinFilter, TextureDesc, TextureId};

pub fn is_power_of_two(n: u32) -> bool {
    n != 0 && n & (n - 1) == 0
}

impl TextureDesc {
    /// Mipmapped trilinear sampling when both sides are powers of two,
    /// plain linear sampling without mipmaps otherwise. Non-power-of-two
    /// textures with mipmap filtering are incomplete on strict backends.
    pub fn for_size(width: u32, height: u32) -> Self {
        if is_power_of_two(width) && is_power_of_two(height) {
            Self {
                width,
                height,
                min_filter: MinFilter::LinearMipmapLinear,
                mipmaps: true,
            }
        } else {
            Self {
                width,
                height,
                min_filter: MinFilter::Linear,
                mipmaps: false,
            }
        }
    }
}

pub fn upload_rgba(
    gpu: &mut dyn Graphics,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<TextureId, GraphicsError> {
    gpu.create_texture(&TextureDesc::for_size(width, height), rgba)
}

pub fn upload_pixmap(gpu: &mut dyn Graphics, pixmap: &Pixmap) -> Result<TextureId, GraphicsError> {
    upload_rgba(gpu, pixmap.width(), pixmap.height(), &pixmap_to_rgba(pixmap))
}

/// Demultiplies a tiny-skia pixmap into straight RGBA8.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_detection() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(256));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(300));
    }

    #[test]
    fn mipmaps_only_for_power_of_two_sizes() {
        let pot = TextureDesc::for_size(256, 64);
        assert!(pot.mipmaps);
        assert_eq!(pot.min_filter, MinFilter::LinearMipmapLinear);

        for (w, h) in [(300, 256), (256, 300), (33, 17)] {
            let npot = TextureDesc::for_size(w, h);
            assert!(!npot.mipmaps);
            assert_eq!(npot.min_filter, MinFilter::Linear);
        }
    }

    #[test]
    fn demultiplies_pixels() {
        let mut pm = Pixmap::new(1, 1).unwrap();
        pm.fill(tiny_skia::Color::from_rgba8(200, 100, 50, 128));
        let rgba = pixmap_to_rgba(&pm);
        assert_eq!(rgba[3], 128);
        assert!((rgba[0] as i32 - 200).abs() <= 2);
        assert!((rgba[1] as i32 - 100).abs() <= 2);
    }
}
