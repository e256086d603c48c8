use crate::config::TimingConfig;
use crate::stimulus::{StimulusError, StimulusPool};
use facesearch_core::{Cell, Expression, GridLayout, TrialCondition, TrialResult, TrialState};
use facesearch_timing::secs_to_ns;
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrialError {
    #[error("set size must be at least 1")]
    EmptySet,
    #[error("set size {set_size} exceeds the {positions} grid positions")]
    SetTooLarge { set_size: usize, positions: usize },
    #[error(transparent)]
    Stimulus(#[from] StimulusError),
}

/// Feedback holds in timer nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTiming {
    /// Grid stays up this long after the column digit.
    pub delay_ns: u64,
    pub hold_ns: u64,
    /// Hold after a wrong training answer, which also shows the solution.
    pub review_hold_ns: u64,
}

impl From<&TimingConfig> for FeedbackTiming {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            delay_ns: secs_to_ns(timing.feedback_delay),
            hold_ns: secs_to_ns(timing.feedback_duration),
            review_hold_ns: secs_to_ns(timing.feedback_duration * 4.0),
        }
    }
}

/// Drives a single trial from the cue to the end of the feedback.
///
/// Key and frame events come in through `continue_pressed`, `digit_pressed`
/// and `frame_presented`; timed holds advance in `update`. All timestamps are
/// nanoseconds of the session timer. Between trials the runner sits in
/// `TrialState::Done`.
#[derive(Debug, Clone)]
pub struct TrialRunner {
    state: TrialState,
    timing: FeedbackTiming,
    condition: TrialCondition,
    training: bool,
    rows: usize,
    cols: usize,
    target_index: usize,
    target_cell: Cell,
    candidates: Vec<usize>,
    distractors: Vec<usize>,
    onset_ns: u64,
    reaction_time: f64,
    row: Option<usize>,
    col: Option<usize>,
    accuracy: bool,
    hold_start_ns: u64,
}

impl TrialRunner {
    pub fn new(grid_len: usize, timing: FeedbackTiming) -> Self {
        Self {
            state: TrialState::Done,
            timing,
            condition: TrialCondition::new(0, Expression::Neutral),
            training: false,
            rows: 0,
            cols: 0,
            target_index: 0,
            target_cell: Cell::new(0, 0),
            candidates: Vec::with_capacity(grid_len),
            distractors: Vec::with_capacity(grid_len),
            onset_ns: 0,
            reaction_time: 0.0,
            row: None,
            col: None,
            accuracy: false,
            hold_start_ns: 0,
        }
    }

    /// Picks target and distractor positions, arranges the pool and arms the cue.
    pub fn begin<R: Rng>(
        &mut self,
        condition: TrialCondition,
        training: bool,
        grid: &GridLayout,
        pool: &mut StimulusPool,
        rng: &mut R,
    ) -> Result<(), TrialError> {
        let set_size = condition.set_size;
        if set_size == 0 {
            return Err(TrialError::EmptySet);
        }
        if set_size > grid.len() {
            return Err(TrialError::SetTooLarge {
                set_size,
                positions: grid.len(),
            });
        }
        if set_size > pool.capacity() {
            return Err(StimulusError::PoolExhausted {
                requested: set_size,
                capacity: pool.capacity(),
            }
            .into());
        }

        let target_index = rng.random_range(0..grid.len());
        self.candidates.clear();
        self.candidates
            .extend((0..grid.len()).filter(|&i| i != target_index));
        let (chosen, _) = self.candidates.partial_shuffle(rng, set_size - 1);
        self.distractors.clear();
        self.distractors.extend_from_slice(chosen);

        let positions = grid.positions();
        pool.arrange(
            condition.target,
            positions[target_index],
            self.distractors.iter().map(|&i| positions[i]),
        )?;

        self.condition = condition;
        self.training = training;
        self.rows = grid.rows();
        self.cols = grid.cols();
        self.target_index = target_index;
        self.target_cell = grid.cell_of(target_index);
        self.row = None;
        self.col = None;
        self.reaction_time = 0.0;
        self.accuracy = false;
        self.state = TrialState::ArmCue;
        debug!(
            "Trial armed: size {}, target {} at {}",
            set_size, condition.target, self.target_cell
        );
        Ok(())
    }

    pub fn continue_pressed(&mut self, now_ns: u64) -> bool {
        match self.state {
            TrialState::ArmCue => {
                self.state = TrialState::Display;
                true
            }
            TrialState::AwaitDetection => {
                let rt_ns = now_ns.saturating_sub(self.onset_ns);
                self.reaction_time = rt_ns as f64 / 1e9;
                self.state = TrialState::AwaitRowResponse;
                true
            }
            _ => false,
        }
    }

    /// The reaction-time clock starts with the first frame showing the faces.
    pub fn frame_presented(&mut self, now_ns: u64) -> bool {
        if self.state == TrialState::Display {
            self.onset_ns = now_ns;
            self.state = TrialState::AwaitDetection;
            true
        } else {
            false
        }
    }

    pub fn digit_pressed(&mut self, digit: u8, now_ns: u64) -> bool {
        let digit = digit as usize;
        match self.state {
            TrialState::AwaitRowResponse if (1..=self.rows).contains(&digit) => {
                self.row = Some(digit);
                self.state = TrialState::AwaitColResponse;
                true
            }
            TrialState::AwaitColResponse if (1..=self.cols).contains(&digit) => {
                self.col = Some(digit);
                self.score(now_ns);
                true
            }
            _ => false,
        }
    }

    fn score(&mut self, now_ns: u64) {
        self.accuracy = self.row == Some(self.target_cell.row) && self.col == Some(self.target_cell.col);
        self.hold_start_ns = now_ns;
        self.state = TrialState::Score;
    }

    /// Advances the timed feedback states. Returns the result once, when the
    /// trial reaches `Done`.
    pub fn update(&mut self, now_ns: u64) -> Option<TrialResult> {
        let held = now_ns.saturating_sub(self.hold_start_ns);
        match self.state {
            TrialState::Score if held >= self.timing.delay_ns => {
                self.hold_start_ns = now_ns;
                self.state = TrialState::Feedback;
                None
            }
            TrialState::Feedback if held >= self.feedback_hold_ns() => {
                self.state = TrialState::Done;
                let result = self.result();
                info!(
                    "Trial Data: RT: {:.4}, ACC: {}, SIZE: {}, STATE: {}, LOC: {}, RES: {}",
                    result.reaction_time,
                    result.accuracy,
                    result.set_size,
                    result.target_state,
                    result.target_position,
                    result.response
                );
                Some(result)
            }
            _ => None,
        }
    }

    fn feedback_hold_ns(&self) -> u64 {
        if self.shows_solution() {
            self.timing.review_hold_ns
        } else {
            self.timing.hold_ns
        }
    }

    /// Block and trial numbers are left at 0 for the caller to fill in.
    fn result(&self) -> TrialResult {
        TrialResult {
            block: 0,
            trial_num: 0,
            set_size: self.condition.set_size,
            target_state: self.condition.target,
            target_position: self.target_cell,
            reaction_time: self.reaction_time,
            response: self.response().unwrap_or(Cell::new(0, 0)),
            accuracy: self.accuracy,
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TrialState::Done
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn condition(&self) -> TrialCondition {
        self.condition
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn target_cell(&self) -> Cell {
        self.target_cell
    }

    pub fn distractor_indices(&self) -> &[usize] {
        &self.distractors
    }

    pub fn entered_row(&self) -> Option<usize> {
        self.row
    }

    pub fn response(&self) -> Option<Cell> {
        Some(Cell::new(self.row?, self.col?))
    }

    pub fn accuracy(&self) -> bool {
        self.accuracy
    }

    pub fn reaction_time(&self) -> f64 {
        self.reaction_time
    }

    /// Wrong training answers get the entered and the correct cell spelled out.
    pub fn shows_solution(&self) -> bool {
        self.training && !self.accuracy
    }
}
