use serde::{Deserialize, Serialize};

use crate::TrialRecord;

/// Aggregate reaction-time statistics over a session's trial log.
///
/// Reaction-time figures are `0.0` when there are no valid trials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionTestStats {
    pub mean_reaction_time: f64,
    pub median_reaction_time: f64,
    /// Sample standard deviation (n - 1).
    pub std_dev: f64,
    pub min_reaction_time: f64,
    pub max_reaction_time: f64,
    pub valid_trials: usize,
    pub missed_trials: usize,
    /// Share of correct responses among trials whose correctness is known.
    pub accuracy: Option<f64>,
}

impl ReactionTestStats {
    /// Practice trials are skipped unless `include_practice` is set.
    pub fn compute(records: &[TrialRecord], include_practice: bool) -> Self {
        let counted: Vec<&TrialRecord> = records
            .iter()
            .filter(|r| include_practice || !r.practice)
            .collect();

        let mut times: Vec<f64> = counted
            .iter()
            .filter(|r| !r.missed)
            .filter_map(|r| r.reaction_time_ms)
            .collect();
        let missed_trials = counted.iter().filter(|r| r.missed).count();

        let scored: Vec<bool> = counted.iter().filter_map(|r| r.correct).collect();
        let accuracy = (!scored.is_empty())
            .then(|| scored.iter().filter(|c| **c).count() as f64 / scored.len() as f64);

        if times.is_empty() {
            return Self {
                missed_trials,
                accuracy,
                ..Self::default()
            };
        }

        times.sort_by(|a, b| a.total_cmp(b));
        let n = times.len();
        let mean = times.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (times[n / 2 - 1] + times[n / 2]) / 2.0
        } else {
            times[n / 2]
        };
        let std_dev = if n > 1 {
            let var = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Self {
            mean_reaction_time: mean,
            median_reaction_time: median,
            std_dev,
            min_reaction_time: times[0],
            max_reaction_time: times[n - 1],
            valid_trials: n,
            missed_trials,
            accuracy,
        }
    }
}
