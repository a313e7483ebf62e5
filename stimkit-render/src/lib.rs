//! GPU abstraction and rasterizers used by stimuli.
//!
//! [`Graphics`] is the rendering-context handle supplied by the host. The
//! engine only ever talks to it from the render thread. [`SoftwareGraphics`]
//! implements it on top of tiny-skia so a session can run without a GPU
//! driver, and so tests can inspect handles and draw calls.

pub mod error;
pub mod fixation;
pub mod graphics;
pub mod shader;
pub mod software;
pub mod text;
pub mod texture;
pub mod waveform;

pub use error::GraphicsError;
pub use graphics::{
    Graphics, MinFilter, ProgramId, QuadDraw, ShaderStage, TextureDesc, TextureId, VertexArrayId,
};
pub use software::{DrawRecord, SoftwareGraphics};
pub use fixation::fixation_cross;
pub use text::{TextAlign, TextStyle, builtin_font, measure_line, rasterize_text, wrap_words};
pub use texture::{is_power_of_two, pixmap_to_rgba, upload_pixmap, upload_rgba};
pub use waveform::{rasterize_waveform, waveform_peaks};
