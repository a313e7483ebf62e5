use thiserror::Error;

use crate::ShaderStage;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphicsError {
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("program failed to link: {0}")]
    ProgramLink(String),

    #[error("unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    #[error("invalid texture: {0}")]
    InvalidTexture(String),

    #[error("invalid font: {0}")]
    InvalidFont(String),
}

impl GraphicsError {
    /// Compile and link failures leave nothing to draw with.
    pub fn is_program_failure(&self) -> bool {
        matches!(
            self,
            GraphicsError::ShaderCompile { .. } | GraphicsError::ProgramLink(_)
        )
    }
}
