//! Trial scheduling: the per-trial state machine, per-question trial
//! blocks, and the session that walks a questionnaire page by page.

pub mod block;
pub mod config;
pub mod error;
pub mod fixation;
pub mod results;
pub mod session;
pub mod trial;

pub use block::TrialBlock;
pub use config::SessionConfig;
pub use error::SessionError;
pub use fixation::{FIXATION_RESOURCE, FixationMarker};
pub use results::{CalibrationSummary, SessionResults};
pub use session::Session;
pub use trial::{Trial, TrialDurations, TrialEvent, TrialTimestamps};
