use serde::{Deserialize, Serialize};

use crate::ColorError;

/// Straight-alpha RGBA color with every channel normalized to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Parses the supported subset of CSS color syntax: `#rgb`, `#rrggbb`,
    /// `rgb(r, g, b)`, `rgba(r, g, b, a)` and a handful of named colors.
    pub fn parse_css(input: &str) -> Result<Self, ColorError> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ColorError::Hex(input.to_string()));
        }

        let lower = s.to_ascii_lowercase();
        if let Some(args) = function_args(&lower, "rgba").or_else(|| function_args(&lower, "rgb")) {
            return parse_rgb_args(args);
        }

        named(&lower).ok_or_else(|| ColorError::Syntax(input.to_string()))
    }

    /// Normalizes a numeric tuple. Channels above `1.0` are read as 8-bit
    /// values; the optional alpha follows the same rule independently.
    pub fn from_tuple(values: &[f32]) -> Result<Self, ColorError> {
        if values.len() != 3 && values.len() != 4 {
            return Err(ColorError::TupleLength(values.len()));
        }
        let eight_bit = values[..3].iter().any(|v| *v > 1.0);
        let channel = |v: f32| {
            if eight_bit { v / 255.0 } else { v }.clamp(0.0, 1.0)
        };
        let alpha = values
            .get(3)
            .map(|a| if *a > 1.0 { a / 255.0 } else { *a }.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        Ok(Self::rgba(
            channel(values[0]),
            channel(values[1]),
            channel(values[2]),
            alpha,
        ))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// A color as written in a questionnaire definition: either a numeric tuple
/// or a CSS color string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Tuple(Vec<f32>),
    Css(String),
}

impl ColorValue {
    pub fn resolve(&self) -> Result<Color, ColorError> {
        match self {
            ColorValue::Tuple(values) => Color::from_tuple(values),
            ColorValue::Css(text) => Color::parse_css(text),
        }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::from_rgba8(
            nibble(0)? * 17,
            nibble(1)? * 17,
            nibble(2)? * 17,
            255,
        )),
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        _ => None,
    }
}

fn function_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_rgb_args(args: &str) -> Result<Color, ColorError> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(ColorError::TupleLength(parts.len()));
    }
    let number = |p: &str| {
        p.parse::<f32>()
            .map_err(|_| ColorError::Component(p.to_string()))
    };
    let r = number(parts[0])?;
    let g = number(parts[1])?;
    let b = number(parts[2])?;
    let a = match parts.get(3) {
        Some(p) => number(p)?,
        None => 1.0,
    };
    Ok(Color::rgba(
        (r / 255.0).clamp(0.0, 1.0),
        (g / 255.0).clamp(0.0, 1.0),
        (b / 255.0).clamp(0.0, 1.0),
        a.clamp(0.0, 1.0),
    ))
}

fn named(name: &str) -> Option<Color> {
    Some(match name {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "transparent" => Color::TRANSPARENT,
        "red" => Color::from_rgba8(255, 0, 0, 255),
        "green" => Color::from_rgba8(0, 128, 0, 255),
        "blue" => Color::from_rgba8(0, 0, 255, 255),
        "gray" | "grey" => Color::from_rgba8(128, 128, 128, 255),
        "yellow" => Color::from_rgba8(255, 255, 0, 255),
        _ => return None,
    })
}
