use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use stimkit_core::Color;
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::GraphicsError;

static BUILTIN_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// DejaVu Sans, compiled in. Text falls back to it when no font resource
/// is loaded.
pub fn builtin_font() -> Result<FontArc, GraphicsError> {
    FontArc::try_from_slice(BUILTIN_FONT).map_err(|e| GraphicsError::InvalidFont(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Color,
    /// Greedy word-wrap width in pixels; `None` keeps each paragraph on one line.
    pub max_width: Option<f32>,
    pub padding: f32,
    /// Line advance as a multiple of the font's height.
    pub line_height: f32,
    pub align: TextAlign,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 32.0,
            color: Color::WHITE,
            max_width: None,
            padding: 8.0,
            line_height: 1.2,
            align: TextAlign::Center,
        }
    }
}

/// Greedy line breaking: a word joins the current line while the line still
/// measures within `max_width`, otherwise it starts the next line. Explicit
/// newlines always break. A single word wider than `max_width` gets a line
/// of its own.
pub fn wrap_words(text: &str, max_width: Option<f32>, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let Some(max_width) = max_width else {
            lines.push(paragraph.split_whitespace().collect::<Vec<_>>().join(" "));
            continue;
        };
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{line} {word}");
            if measure(&candidate) <= max_width {
                line = candidate;
            } else {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            }
        }
        lines.push(line);
    }
    lines
}

pub fn measure_line<F: Font>(font: &F, scale: PxScale, text: &str) -> f32 {
    let sf = font.as_scaled(scale);
    let mut width = 0.0;
    let mut prev = None;
    for ch in text.chars() {
        let id = sf.glyph_id(ch);
        if let Some(prev) = prev {
            width += sf.kern(prev, id);
        }
        width += sf.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Rasterizes wrapped text into a transparent pixmap sized to the text plus
/// padding on every side.
pub fn rasterize_text<F: Font>(font: &F, text: &str, style: &TextStyle) -> Result<Pixmap, GraphicsError> {
    let scale = PxScale::from(style.font_size);
    let sf = font.as_scaled(scale);

    let lines = wrap_words(text, style.max_width, |s| measure_line(font, scale, s));
    let widths: Vec<f32> = lines.iter().map(|l| measure_line(font, scale, l)).collect();
    let content_w = widths.iter().copied().fold(0.0f32, f32::max);
    let advance = sf.height() * style.line_height;
    let content_h = advance * lines.len().saturating_sub(1) as f32 + sf.height();

    let w = (content_w + style.padding * 2.0).ceil().max(1.0) as u32;
    let h = (content_h + style.padding * 2.0).ceil().max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)
        .ok_or_else(|| GraphicsError::InvalidTexture(format!("text surface {w}x{h}")))?;

    let [cr, cg, cb, ca] = style.color.to_rgba8();
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for (i, (line, line_w)) in lines.iter().zip(&widths).enumerate() {
        let x0 = style.padding
            + match style.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (content_w - line_w) * 0.5,
                TextAlign::Right => content_w - line_w,
            };
        let baseline = style.padding + sf.ascent() + advance * i as f32;

        let mut pen_x = x0;
        let mut glyphs = Vec::<Glyph>::new();
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = glyphs.last() {
                pen_x += sf.kern(prev.id, id);
            }
            glyphs.push(Glyph {
                id,
                scale,
                position: point(pen_x, baseline),
            });
            pen_x += sf.h_advance(id);
        }

        for g in glyphs {
            let Some(outline) = font.outline_glyph(g) else {
                continue;
            };
            let b = outline.px_bounds();
            outline.draw(|x, y, cov| {
                if cov <= f32::EPSILON {
                    return;
                }
                let ix = (x as f32 + b.min.x).floor() as i64;
                let iy = (y as f32 + b.min.y).floor() as i64;
                if ix < 0 || iy < 0 || ix >= w as i64 || iy >= h as i64 {
                    return;
                }
                let idx = iy as usize * stride + ix as usize;

                // Porter-Duff over in premultiplied space.
                let a = (cov * ca as f32 / 255.0).clamp(0.0, 1.0);
                let src = [cr as f32 * a, cg as f32 * a, cb as f32 * a, a * 255.0];
                let bg = dst[idx];
                let inv = 1.0 - a;
                let blend = |s: f32, d: u8| (s + d as f32 * inv).round().clamp(0.0, 255.0) as u8;
                if let Some(px) = PremultipliedColorU8::from_rgba(
                    blend(src[0], bg.red()),
                    blend(src[1], bg.green()),
                    blend(src[2], bg.blue()),
                    blend(src[3], bg.alpha()),
                ) {
                    dst[idx] = px;
                }
            });
        }
    }

    Ok(pm)
}
