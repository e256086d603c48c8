/// Session phases, in presentation order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Instructions,
    Training,
    TrainingComplete,
    BlockIntro,
    Block,
    Closing,
    Finished,
}

impl SessionPhase {
    /// The phase that follows in a straight run. `Block` loops back to
    /// `BlockIntro` while blocks remain; that decision belongs to the caller.
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Instructions => Training,
            Training => TrainingComplete,
            TrainingComplete => BlockIntro,
            BlockIntro => Block,
            Block => Closing,
            Closing => Finished,
            Finished => return None,
        })
    }

    /// Phases in which trials are running.
    pub fn runs_trials(&self) -> bool {
        matches!(self, Self::Training | Self::Block)
    }

    /// Phases that ignore key presses for the anti-skip delay after they appear.
    pub fn guards_against_skip(&self) -> bool {
        matches!(self, Self::Instructions | Self::BlockIntro)
    }

    pub fn is_training(&self) -> bool {
        matches!(self, Self::Training)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_run_ends_in_finished() {
        let mut phase = SessionPhase::default();
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            seen.push(phase);
        }
        assert_eq!(seen.len(), 7);
        assert!(phase.is_finished());
        assert!(seen.iter().filter(|p| p.runs_trials()).count() == 2);
    }
}
