use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStats {
    pub samples: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Rolling window of frame intervals measured from successive frame stamps.
#[derive(Debug, Clone)]
pub struct FrameCalibration {
    intervals: VecDeque<Duration>,
    max_samples: usize,
    last_frame_ns: Option<u64>,
}

impl FrameCalibration {
    pub fn new(max_samples: usize) -> Self {
        Self {
            intervals: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            last_frame_ns: None,
        }
    }

    /// Records the frame stamped `now_ns`; the first call only sets the origin.
    pub fn record_frame_at(&mut self, now_ns: u64) {
        if let Some(last) = self.last_frame_ns {
            self.record_interval(Duration::from_nanos(now_ns.saturating_sub(last)));
        }
        self.last_frame_ns = Some(now_ns);
    }

    pub fn record_interval(&mut self, d: Duration) {
        if self.intervals.len() >= self.max_samples {
            self.intervals.pop_front();
        }
        self.intervals.push_back(d);
    }

    pub fn sample_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn stats(&self) -> CalibrationStats {
        let times: Vec<f64> = self
            .intervals
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return CalibrationStats::default();
        }
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            samples: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl Default for FrameCalibration {
    fn default() -> Self {
        Self::new(1000)
    }
}
