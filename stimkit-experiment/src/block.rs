use rand::Rng;
use stimkit_core::{Question, TrialPlan};

use crate::{Trial, TrialDurations};

/// Hands out the trials of one question in order; the first
/// `plan.practice` of them are flagged as practice.
#[derive(Debug, Clone)]
pub struct TrialBlock {
    question_id: String,
    plan: TrialPlan,
    next: usize,
}

impl TrialBlock {
    pub fn new(question_id: impl Into<String>, plan: TrialPlan) -> Self {
        Self {
            question_id: question_id.into(),
            plan,
            next: 0,
        }
    }

    pub fn for_question(question: &Question) -> Self {
        Self::new(question.id.clone(), question.trials)
    }

    pub fn len(&self) -> usize {
        self.plan.count
    }

    pub fn is_empty(&self) -> bool {
        self.plan.count == 0
    }

    pub fn remaining(&self) -> usize {
        self.plan.count.saturating_sub(self.next)
    }

    /// Next trial with freshly jittered durations, or `None` once the block
    /// is exhausted.
    pub fn next_trial(&mut self, question: &Question, rng: &mut impl Rng) -> Option<Trial> {
        if self.next >= self.plan.count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(Trial::new(
            index,
            self.question_id.clone(),
            index < self.plan.practice,
            TrialDurations::sample(question, rng),
        ))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn practice_trials_come_first() {
        let question: Question = serde_json::from_value(serde_json::json!({
            "id": "rt",
            "trials": {"count": 20, "warmup": 3}
        }))
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut block = TrialBlock::for_question(&question);
        assert_eq!(block.len(), 20);

        let trials: Vec<Trial> = std::iter::from_fn(|| block.next_trial(&question, &mut rng)).collect();
        assert_eq!(trials.len(), 20);
        assert_eq!(trials.iter().filter(|t| t.practice).count(), 3);
        assert!(trials[..3].iter().all(|t| t.practice));
        assert_eq!(
            trials.iter().map(|t| t.index).collect::<Vec<_>>(),
            (0..20).collect::<Vec<_>>()
        );
        assert_eq!(block.remaining(), 0);
        assert!(block.next_trial(&question, &mut rng).is_none());
    }
}
