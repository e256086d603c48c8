use facesearch_core::{Expression, TrialCondition, TrialResult};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::{info, warn};

/// Every set size crossed with every target state, `repetitions` times,
/// in random order.
pub fn build_conditions<R: Rng>(
    set_sizes: &[usize],
    target_states: &[Expression],
    repetitions: usize,
    rng: &mut R,
) -> Vec<TrialCondition> {
    let mut conditions = Vec::with_capacity(set_sizes.len() * target_states.len() * repetitions);
    for &set_size in set_sizes {
        for &target in target_states {
            for _ in 0..repetitions {
                conditions.push(TrialCondition::new(set_size, target));
            }
        }
    }
    conditions.shuffle(rng);
    info!("Generated {} trial conditions", conditions.len());
    conditions
}

/// Hands out the shuffled conditions block by block.
///
/// The number of blocks is the condition count divided by the block size;
/// conditions left over by that division are never run.
#[derive(Debug, Clone)]
pub struct BlockController {
    conditions: VecDeque<TrialCondition>,
    block_size: usize,
    num_blocks: usize,
    /// 1-based once the first block has started.
    block: usize,
    in_block: usize,
    trial_num: usize,
}

impl BlockController {
    pub fn new(conditions: Vec<TrialCondition>, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let num_blocks = conditions.len() / block_size;
        let dropped = conditions.len() % block_size;
        if dropped > 0 {
            warn!(
                "{} trial conditions do not fill a block of {} and will not be run",
                dropped, block_size
            );
        }
        Self {
            conditions: conditions.into(),
            block_size,
            num_blocks,
            block: 0,
            in_block: 0,
            trial_num: 1,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Current block, 1-based; 0 before the first block.
    pub fn current_block(&self) -> usize {
        self.block
    }

    /// Number of the block that `start_block` would open next, if any.
    pub fn upcoming_block(&self) -> Option<usize> {
        (self.block < self.num_blocks).then_some(self.block + 1)
    }

    pub fn has_remaining_blocks(&self) -> bool {
        self.block < self.num_blocks
    }

    /// Opens the next block. False when all blocks have been run.
    pub fn start_block(&mut self) -> bool {
        if !self.has_remaining_blocks() {
            return false;
        }
        self.block += 1;
        self.in_block = 0;
        info!("Starting block {}", self.block);
        true
    }

    /// Next condition of the current block, or `None` when the block is over.
    pub fn next_condition(&mut self) -> Option<TrialCondition> {
        if self.block == 0 || self.in_block >= self.block_size {
            return None;
        }
        match self.conditions.pop_front() {
            Some(condition) => {
                self.in_block += 1;
                info!("Starting trial {}", self.trial_num);
                Some(condition)
            }
            None => {
                warn!(
                    "Trial conditions list is empty before trial {}. Ending block {} early.",
                    self.trial_num, self.block
                );
                self.in_block = self.block_size;
                None
            }
        }
    }

    /// Writes the live block and trial counters into a finished result and
    /// advances the trial counter.
    pub fn stamp(&mut self, result: &mut TrialResult) {
        result.block = self.block;
        result.trial_num = self.trial_num;
        self.trial_num += 1;
    }

    pub fn remaining_conditions(&self) -> usize {
        self.conditions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facesearch_core::Cell;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn conditions(n: usize) -> Vec<TrialCondition> {
        (0..n)
            .map(|i| TrialCondition::new(i + 1, Expression::Positive))
            .collect()
    }

    fn result() -> TrialResult {
        TrialResult {
            block: 0,
            trial_num: 0,
            set_size: 7,
            target_state: Expression::Negative,
            target_position: Cell::new(1, 1),
            reaction_time: 0.5,
            response: Cell::new(1, 1),
            accuracy: true,
        }
    }

    /// Runs every block and returns the trial count of each.
    fn run_all(controller: &mut BlockController) -> Vec<usize> {
        let mut per_block = Vec::new();
        while controller.start_block() {
            let mut count = 0;
            while controller.next_condition().is_some() {
                count += 1;
            }
            per_block.push(count);
        }
        per_block
    }

    #[test]
    fn design_is_fully_crossed_and_shuffled() {
        let mut rng = StdRng::seed_from_u64(11);
        let sizes = [7, 11, 15, 19];
        let states = [Expression::Positive, Expression::Negative];
        let list = build_conditions(&sizes, &states, 30, &mut rng);
        assert_eq!(list.len(), 240);

        let mut counts: HashMap<TrialCondition, usize> = HashMap::new();
        for c in &list {
            *counts.entry(*c).or_default() += 1;
        }
        assert_eq!(counts.len(), 8);
        assert!(counts.values().all(|&n| n == 30));

        let again = build_conditions(&sizes, &states, 30, &mut StdRng::seed_from_u64(11));
        assert_eq!(list, again);
        assert_ne!(&list[..8], &list[8..16]);
    }

    #[test]
    fn remainder_is_never_run() {
        for (len, block_size) in [(240, 30), (10, 3), (7, 7), (5, 6), (13, 4)] {
            let mut controller = BlockController::new(conditions(len), block_size);
            let per_block = run_all(&mut controller);
            assert_eq!(per_block.len(), len / block_size);
            assert!(per_block.iter().all(|&n| n == block_size));
            assert_eq!(controller.remaining_conditions(), len % block_size);
        }
    }

    #[test]
    fn conditions_are_consumed_in_order() {
        let mut controller = BlockController::new(conditions(4), 2);
        assert_eq!(controller.next_condition(), None);
        assert_eq!(controller.upcoming_block(), Some(1));
        assert!(controller.start_block());
        assert_eq!(controller.next_condition().map(|c| c.set_size), Some(1));
        assert_eq!(controller.next_condition().map(|c| c.set_size), Some(2));
        assert_eq!(controller.next_condition(), None);
        assert!(controller.start_block());
        assert_eq!(controller.current_block(), 2);
        assert_eq!(controller.next_condition().map(|c| c.set_size), Some(3));
        assert_eq!(controller.upcoming_block(), None);
    }

    #[test]
    fn results_get_live_counters() {
        let mut controller = BlockController::new(conditions(4), 2);
        let mut stamped = Vec::new();
        while controller.start_block() {
            while controller.next_condition().is_some() {
                let mut r = result();
                controller.stamp(&mut r);
                stamped.push((r.block, r.trial_num));
            }
        }
        assert_eq!(stamped, vec![(1, 1), (1, 2), (2, 3), (2, 4)]);
    }

    #[test]
    fn empty_design_has_no_blocks() {
        let mut controller = BlockController::new(Vec::new(), 30);
        assert_eq!(controller.num_blocks(), 0);
        assert!(!controller.start_block());
    }
}
