use serde::{Deserialize, Serialize};

/// Offset in pixels from the center of the viewport (positive `y` is down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

impl Position {
    pub const CENTER: Position = Position { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in viewport pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of `size` centered on `position` inside a `width`x`height` viewport.
    pub fn centered(position: Position, size: Size, width: u32, height: u32) -> Self {
        let cx = width as f32 * 0.5 + position.x;
        let cy = height as f32 * 0.5 + position.y;
        Self::from_xywh(
            cx - size.width * 0.5,
            cy - size.height * 0.5,
            size.width,
            size.height,
        )
    }
}

/// Offset/scale/opacity a parent applies on top of a child's own placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTransform {
    pub offset: Position,
    pub scale: f32,
    pub opacity: f32,
}

impl LayerTransform {
    pub const IDENTITY: LayerTransform = LayerTransform {
        offset: Position::CENTER,
        scale: 1.0,
        opacity: 1.0,
    };

    pub fn new(offset: Position, scale: f32, opacity: f32) -> Self {
        Self {
            offset,
            scale,
            opacity,
        }
    }

    /// Composes `child` inside `self`: the child's offset is scaled by the
    /// parent before being added.
    pub fn then(&self, child: &LayerTransform) -> LayerTransform {
        LayerTransform {
            offset: Position::new(
                self.offset.x + child.offset.x * self.scale,
                self.offset.y + child.offset.y * self.scale,
            ),
            scale: self.scale * child.scale,
            opacity: self.opacity * child.opacity,
        }
    }

    /// Maps a stimulus's own position and size through this transform.
    pub fn apply(&self, position: Position, size: Size) -> (Position, Size) {
        (
            Position::new(
                self.offset.x + position.x * self.scale,
                self.offset.y + position.y * self.scale,
            ),
            Size::new(size.width * self.scale, size.height * self.scale),
        )
    }
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
