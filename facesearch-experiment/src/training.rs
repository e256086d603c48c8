use facesearch_core::{Expression, TrialCondition};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

/// Training trials at a fixed set size until enough answers were correct.
///
/// Target expressions are drawn from a shuffled rotation that is refilled
/// once every expression has been used, so each expression appears once per
/// rotation.
#[derive(Debug, Clone)]
pub struct TrainingController {
    set_size: usize,
    quota: usize,
    target_states: Vec<Expression>,
    rotation: Vec<Expression>,
    correct: usize,
    total: usize,
}

impl TrainingController {
    pub fn new(set_size: usize, quota: usize, target_states: &[Expression]) -> Self {
        Self {
            set_size,
            quota,
            target_states: target_states.to_vec(),
            rotation: Vec::with_capacity(target_states.len()),
            correct: 0,
            total: 0,
        }
    }

    /// Condition for the next training trial.
    pub fn next_condition<R: Rng>(&mut self, rng: &mut R) -> TrialCondition {
        TrialCondition::new(self.set_size, self.next_target(rng))
    }

    fn next_target<R: Rng>(&mut self, rng: &mut R) -> Expression {
        if self.rotation.is_empty() {
            self.rotation.extend_from_slice(&self.target_states);
            self.rotation.shuffle(rng);
        }
        self.rotation.pop().unwrap_or(Expression::Positive)
    }

    /// Counts a finished trial. Returns true when this trial filled the quota.
    pub fn record(&mut self, accuracy: bool) -> bool {
        self.total += 1;
        if accuracy {
            self.correct += 1;
        }
        if self.is_complete() {
            info!("Training completed in {} trials", self.total);
            true
        } else {
            false
        }
    }

    pub fn is_complete(&self) -> bool {
        self.correct >= self.quota
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const STATES: [Expression; 2] = [Expression::Positive, Expression::Negative];

    #[test]
    fn rotation_uses_every_expression_once_per_round() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut training = TrainingController::new(3, 4, &STATES);
        let draws: Vec<_> = (0..40)
            .map(|_| training.next_condition(&mut rng))
            .collect();

        assert!(draws.iter().all(|c| c.set_size == 3));
        for round in draws.chunks(2) {
            assert_ne!(round[0].target, round[1].target);
        }
        for window in draws.windows(3) {
            let same = window.iter().all(|c| c.target == window[0].target);
            assert!(!same, "three identical targets in a row: {window:?}");
        }
    }

    #[test]
    fn only_correct_trials_count_toward_the_quota() {
        let mut training = TrainingController::new(3, 4, &STATES);
        let answers = [true, false, false, true, true, false, true];
        let finished: Vec<bool> = answers.iter().map(|&a| training.record(a)).collect();

        assert_eq!(finished, [false, false, false, false, false, false, true]);
        assert!(training.is_complete());
        assert_eq!(training.correct(), 4);
        assert_eq!(training.total(), 7);
    }

    #[test]
    fn single_expression_rotation_repeats_it() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut training = TrainingController::new(2, 1, &[Expression::Negative]);
        for _ in 0..5 {
            assert_eq!(
                training.next_condition(&mut rng).target,
                Expression::Negative
            );
        }
    }
}
