use stimkit_core::Color;
use tiny_skia::{Paint, Pixmap, Rect, Transform};

use crate::GraphicsError;

/// Fixation cross: two centered bars spanning the full `size`.
pub fn fixation_cross(size: u32, thickness: f32, color: Color) -> Result<Pixmap, GraphicsError> {
    let mut pm = Pixmap::new(size, size)
        .ok_or_else(|| GraphicsError::InvalidTexture(format!("fixation cross {size}x{size}")))?;

    let mut paint = Paint::default();
    paint.anti_alias = false;
    let [r, g, b, a] = color.to_rgba8();
    paint.set_color_rgba8(r, g, b, a);

    let extent = size as f32;
    let offset = (extent - thickness) * 0.5;
    let bars = [
        Rect::from_xywh(0.0, offset, extent, thickness),
        Rect::from_xywh(offset, 0.0, thickness, extent),
    ];
    for bar in bars.into_iter().flatten() {
        pm.fill_rect(bar, &paint, Transform::identity(), None);
    }
    Ok(pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_covers_center_but_not_corners() {
        let pm = fixation_cross(40, 2.0, Color::WHITE).unwrap();
        assert_eq!(pm.pixel(20, 20).unwrap().alpha(), 255);
        assert_eq!(pm.pixel(0, 19).unwrap().alpha(), 255);
        assert_eq!(pm.pixel(0, 0).unwrap().alpha(), 0);
        assert_eq!(pm.pixel(39, 39).unwrap().alpha(), 0);
    }
}
