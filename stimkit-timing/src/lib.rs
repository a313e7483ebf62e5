//! Clocks and frame-timing calibration.

pub mod calibration;
pub mod timer;

pub use calibration::{CalibrationStats, FrameCalibration};
pub use timer::{HighPrecisionTimer, ManualClock, Timer};
