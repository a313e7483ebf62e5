//! Shared data model for the stimkit presentation engine.
//!
//! Everything here is plain data: declarative questionnaire and stimulus
//! configuration, colors and geometry, per-frame render context, trial
//! records and their aggregate statistics. The crates that render, load and
//! schedule build on these types.

pub mod color;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod geometry;
pub mod input;
pub mod phase;
pub mod questionnaire;
pub mod stats;
pub mod timing;
pub mod trial;

pub use color::{Color, ColorValue};
pub use config::{ComponentConfig, StimulusConfig, StyleConfig};
pub use context::RenderContext;
pub use diagnostic::{Diagnostic, ErrorSink, TracingSink};
pub use error::{ColorError, ConfigError};
pub use geometry::{LayerTransform, Position, Rect, Size};
pub use input::{InputEvent, PointerButton, ResponseInput};
pub use phase::SessionPhase;
pub use questionnaire::{
    DisplayConfig, FixationTiming, Page, Question, QuestionKind, QuestionTiming, Questionnaire,
    ResponseConfig, TrialPlan,
};
pub use stats::ReactionTestStats;
pub use timing::{StimulusTiming, Transition, TransitionKind, TransitionSpec, Visibility};
pub use trial::{PendingTrial, TrialRecord, TrialState};
