use stimkit_core::Color;
use tiny_skia::{Paint, Pixmap, Rect, Transform};

use crate::GraphicsError;

/// Min/max peak per bucket of interleaved samples, mixed down to mono.
pub fn waveform_peaks(samples: &[f32], channels: u16, buckets: usize) -> Vec<(f32, f32)> {
    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    if frames == 0 || buckets == 0 {
        return Vec::new();
    }
    let per_bucket = frames.div_ceil(buckets);
    samples
        .chunks(per_bucket * channels)
        .map(|chunk| {
            chunk
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .fold((f32::MAX, f32::MIN), |(lo, hi), s| (lo.min(s), hi.max(s)))
        })
        .collect()
}

/// Draws one vertical bar per peak, centered on the horizontal midline.
pub fn rasterize_waveform(
    peaks: &[(f32, f32)],
    width: u32,
    height: u32,
    color: Color,
) -> Result<Pixmap, GraphicsError> {
    let mut pm = Pixmap::new(width, height)
        .ok_or_else(|| GraphicsError::InvalidTexture(format!("waveform {width}x{height}")))?;
    if peaks.is_empty() {
        return Ok(pm);
    }

    let mut paint = Paint::default();
    let [r, g, b, a] = color.to_rgba8();
    paint.set_color_rgba8(r, g, b, a);

    let mid = height as f32 * 0.5;
    let bar_w = width as f32 / peaks.len() as f32;
    for (i, (lo, hi)) in peaks.iter().enumerate() {
        let top = mid - hi.clamp(-1.0, 1.0) * mid;
        let bottom = mid - lo.clamp(-1.0, 1.0) * mid;
        let bar = Rect::from_xywh(i as f32 * bar_w, top, bar_w.max(1.0), (bottom - top).max(1.0));
        if let Some(bar) = bar {
            pm.fill_rect(bar, &paint, Transform::identity(), None);
        }
    }
    Ok(pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peaks_track_extremes_per_bucket() {
        let samples = [0.0, 0.5, -0.25, 0.1, 1.0, -1.0];
        let peaks = waveform_peaks(&samples, 1, 2);
        assert_eq!(peaks, vec![(-0.25, 0.5), (-1.0, 1.0)]);
    }

    #[test]
    fn stereo_frames_are_mixed_down() {
        let samples = [1.0, 0.0, -1.0, 0.0];
        let peaks = waveform_peaks(&samples, 2, 1);
        assert_eq!(peaks, vec![(-0.5, 0.5)]);
    }

    #[test]
    fn full_scale_bar_spans_height() {
        let pm = rasterize_waveform(&[(-1.0, 1.0)], 4, 10, Color::WHITE).unwrap();
        assert_eq!(pm.pixel(2, 0).unwrap().alpha(), 255);
        assert_eq!(pm.pixel(2, 9).unwrap().alpha(), 255);
    }
}
