use crate::blocks::{BlockController, build_conditions};
use crate::config::{ConfigError, ExperimentConfig};
use crate::persist::ResultSink;
use crate::screens::Screens;
use crate::stimulus::{FaceStyle, StimulusError, StimulusPool};
use crate::training::TrainingController;
use crate::trial::{FeedbackTiming, TrialRunner};
use facesearch_core::{
    GeometryError, GridLayout, ParticipantInfo, Scene, SessionPhase, SurfaceGeometry, TrialResult,
};
use facesearch_timing::{FrameTimingStats, Timer, secs_to_ns};
use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Input the session reacts to. Keys are already mapped by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentEvent {
    Continue,
    Back,
    Digit(u8),
    /// A frame composed from the current state is now on screen.
    FramePresented,
    Abort,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot lay out the position grid: {0}")]
    Geometry(#[from] GeometryError),
    #[error("cannot preload stimuli: {0}")]
    Stimulus(#[from] StimulusError),
}

/// One participant session: instructions, training, the main blocks and the
/// closing screen.
pub struct ExperimentStateMachine<T, R, S>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    S: ResultSink,
{
    config: ExperimentConfig,
    participant: ParticipantInfo,
    timer: T,
    rng: R,
    sink: S,
    grid: GridLayout,
    pool: StimulusPool,
    runner: TrialRunner,
    training: TrainingController,
    blocks: BlockController,
    screens: Screens,
    phase: SessionPhase,
    page: usize,
    shown_at: u64,
    skip_guard_ns: u64,
    revision: u64,
    aborted: bool,
}

impl<T, R, S> ExperimentStateMachine<T, R, S>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    S: ResultSink,
{
    pub fn new(
        config: ExperimentConfig,
        participant: ParticipantInfo,
        surface: SurfaceGeometry,
        timer: T,
        mut rng: R,
        sink: S,
    ) -> Result<Self, SetupError> {
        config.validate()?;

        let grid = GridLayout::new(
            surface,
            config.grid.rows,
            config.grid.cols,
            config.grid.spacing_cm,
        )?;
        let trials = &config.trials;
        let conditions = build_conditions(
            &trials.set_sizes,
            &trials.target_states,
            trials.trials_per_condition,
            &mut rng,
        );
        let blocks = BlockController::new(conditions, trials.trials_per_condition);
        let training = TrainingController::new(
            trials.training_set_size,
            trials.training_quota,
            &trials.target_states,
        );

        let style = FaceStyle::new(config.appearance.stim_size_cm, config.appearance.color);
        let pool = StimulusPool::preload(config.pool_size(), style)?;
        let runner = TrialRunner::new(grid.len(), FeedbackTiming::from(&config.timing));
        let screens = Screens::new(&config, surface);
        let skip_guard_ns = secs_to_ns(config.timing.skip_prot);
        let shown_at = timer.now();

        info!(
            "{} main trial conditions in {} blocks of {}",
            config.total_conditions(),
            blocks.num_blocks(),
            trials.trials_per_condition
        );
        info!("Setup completed for subject_{}", participant.sub_id);
        info!("Presenting instruction 1");

        Ok(Self {
            config,
            participant,
            timer,
            rng,
            sink,
            grid,
            pool,
            runner,
            training,
            blocks,
            screens,
            phase: SessionPhase::default(),
            page: 0,
            shown_at,
            skip_guard_ns,
            revision: 0,
            aborted: false,
        })
    }

    /// Feeds one input event. Returns whether it changed anything.
    pub fn handle_event(&mut self, event: ExperimentEvent) -> bool {
        let now = self.timer.now();
        let handled = match (self.phase, event) {
            (SessionPhase::Finished, _) => false,
            (_, ExperimentEvent::Abort) => {
                warn!("Session aborted during {:?}", self.phase);
                self.aborted = true;
                self.phase = SessionPhase::Finished;
                true
            }

            (SessionPhase::Instructions, ExperimentEvent::Continue) if self.guard_passed(now) => {
                self.page += 1;
                if self.page >= self.screens.page_count() {
                    self.enter_training();
                } else {
                    self.show_page(now);
                }
                true
            }
            (SessionPhase::Instructions, ExperimentEvent::Back)
                if self.guard_passed(now) && self.page > 0 =>
            {
                self.page -= 1;
                self.show_page(now);
                true
            }

            (phase, ExperimentEvent::Continue) if phase.runs_trials() => {
                self.runner.continue_pressed(now)
            }
            (phase, ExperimentEvent::Digit(digit)) if phase.runs_trials() => {
                self.runner.digit_pressed(digit, now)
            }
            (phase, ExperimentEvent::FramePresented) if phase.runs_trials() => {
                self.runner.frame_presented(now)
            }

            (SessionPhase::TrainingComplete, ExperimentEvent::Continue) => {
                self.enter_block_intro(now);
                true
            }
            (SessionPhase::BlockIntro, ExperimentEvent::Continue) if self.guard_passed(now) => {
                self.enter_block();
                true
            }
            (SessionPhase::Closing, ExperimentEvent::Back) => {
                info!("Experiment completed");
                self.phase = SessionPhase::Finished;
                true
            }

            _ => false,
        };
        if handled {
            self.revision += 1;
        }
        handled
    }

    /// Time-driven transitions. Call once per frame.
    pub fn update(&mut self) {
        if !self.phase.runs_trials() {
            return;
        }
        let before = self.runner.state();
        let finished = self.runner.update(self.timer.now());
        if self.runner.state() != before {
            self.revision += 1;
        }
        if let Some(result) = finished {
            self.finish_trial(result);
        }
    }

    /// Draws the current screen.
    pub fn compose(&self, scene: &mut Scene) {
        match self.phase {
            SessionPhase::Instructions => self.screens.instructions(scene, self.page),
            SessionPhase::Training | SessionPhase::Block => {
                self.screens
                    .trial(scene, &self.runner, &self.pool, &self.grid)
            }
            SessionPhase::TrainingComplete => self.screens.training_complete(scene),
            SessionPhase::BlockIntro => {
                let total = self.blocks.num_blocks();
                let block = self.blocks.upcoming_block().unwrap_or(total);
                self.screens.block_intro(scene, block, total)
            }
            SessionPhase::Closing => self.screens.closing(scene),
            SessionPhase::Finished => self.screens.blank(scene),
        }
    }

    fn guard_passed(&self, now: u64) -> bool {
        now.saturating_sub(self.shown_at) >= self.skip_guard_ns
    }

    fn show_page(&mut self, now: u64) {
        self.shown_at = now;
        info!("Presenting instruction {}", self.page + 1);
    }

    fn enter_training(&mut self) {
        info!("Starting training phase");
        self.phase = SessionPhase::Training;
        self.start_training_trial();
    }

    fn start_training_trial(&mut self) {
        let condition = self.training.next_condition(&mut self.rng);
        if let Err(err) = self
            .runner
            .begin(condition, true, &self.grid, &mut self.pool, &mut self.rng)
        {
            // every training trial has the same set size, so retrying cannot help
            error!("Error running training trial: {err}");
            self.phase = SessionPhase::TrainingComplete;
        }
    }

    fn enter_block_intro(&mut self, now: u64) {
        if self.blocks.has_remaining_blocks() {
            self.phase = SessionPhase::BlockIntro;
            self.shown_at = now;
        } else {
            self.phase = SessionPhase::Closing;
        }
    }

    fn enter_block(&mut self) {
        self.blocks.start_block();
        self.phase = SessionPhase::Block;
        self.start_block_trial();
    }

    /// Starts the next trial of the current block, skipping conditions that
    /// cannot be run. Leaves the block when it has no conditions left.
    fn start_block_trial(&mut self) {
        while let Some(condition) = self.blocks.next_condition() {
            match self
                .runner
                .begin(condition, false, &self.grid, &mut self.pool, &mut self.rng)
            {
                Ok(()) => return,
                Err(err) => error!("Error running trial with {condition:?}: {err}"),
            }
        }
        info!("Block {} completed", self.blocks.current_block());
        let now = self.timer.now();
        self.enter_block_intro(now);
    }

    fn finish_trial(&mut self, mut result: TrialResult) {
        match self.phase {
            SessionPhase::Training => {
                if self.training.record(result.accuracy) {
                    self.phase = SessionPhase::TrainingComplete;
                } else {
                    self.start_training_trial();
                }
            }
            SessionPhase::Block => {
                self.blocks.stamp(&mut result);
                if let Err(err) = self.sink.record(&self.participant, &result) {
                    error!("Error saving data for trial {}: {err}", result.trial_num);
                }
                self.start_block_trial();
            }
            _ => {}
        }
    }

    pub fn record_frame(&mut self, frame_time: Duration) {
        self.timer.record_frame(frame_time);
    }

    pub fn frame_stats(&self) -> FrameTimingStats {
        self.timer.frame_stats()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_finished()
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    /// Bumped whenever what should be on screen may have changed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn participant(&self) -> &ParticipantInfo {
        &self.participant
    }

    pub fn grid(&self) -> &GridLayout {
        &self.grid
    }

    pub fn runner(&self) -> &TrialRunner {
        &self.runner
    }

    pub fn training(&self) -> &TrainingController {
        &self.training
    }

    pub fn blocks(&self) -> &BlockController {
        &self.blocks
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
