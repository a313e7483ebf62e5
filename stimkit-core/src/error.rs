use thiserror::Error;

/// Errors raised while parsing a color value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    #[error("unrecognized color syntax `{0}`")]
    Syntax(String),

    #[error("invalid hex color `{0}`")]
    Hex(String),

    #[error("color tuple must have 3 or 4 components, got {0}")]
    TupleLength(usize),

    #[error("color component `{0}` is not a number")]
    Component(String),
}

/// Errors raised while loading or validating a questionnaire definition.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("questionnaire is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("question `{question}`: {reason}")]
    Question { question: String, reason: String },

    #[error("questionnaire has no pages")]
    Empty,
}
