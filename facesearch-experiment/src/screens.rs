//! Everything the participant reads or looks at, composed into a `Scene`.

use crate::config::ExperimentConfig;
use crate::stimulus::StimulusPool;
use crate::trial::TrialRunner;
use facesearch_core::{DrawCommand, GridLayout, Point, Rgba, Scene, SurfaceGeometry, TrialState};

/// Fraction of the display width text blocks may use before wrapping.
const WRAP_FRACTION: f32 = 0.8;

/// Which number row of the localisation grid is being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

/// Instruction pages with the configured keys and grid size filled in.
pub fn instruction_pages(config: &ExperimentConfig) -> Vec<String> {
    let cont = config.keys.continue_label();
    let back = config.keys.return_label();
    let max_digit = config.grid.rows.max(config.grid.cols);

    vec![
        format!(
            "Welcome to the experiment!\n\n\
             Please read these instructions carefully:\n\n\
             Every trial starts with a '{cont}' on the screen asking you to press the '{cont}' key.\n\n\
             You will then see a number of schematic faces (smileys) at random positions on the screen.\n\n\
             Exactly one smiley always differs from all the others.\n\n\
             Your first task is to find this one different smiley as fast as possible and to press '{cont}' as soon as you have found it.\n\n\
             Press '{cont}' to continue ..."
        ),
        format!(
            "Afterwards a grid with numbered rows and columns is laid over all possible positions.\n\n\
             Your second task is to enter first the row and then the column of the grid where the different smiley was.\n\n\
             Use the keys '1' to '{max_digit}' for this. Answering fast does not matter here!\n\n\
             Please answer as accurately as possible.\n\n\
             The numbers of the row or column you are asked for are highlighted in colour.\n\n\
             Press '{cont}' to continue ...\n\n\
             Press '{back}' to go back ..."
        ),
        format!(
            "After entering the row and column you will be told whether your answer was correct.\n\n\
             Then a '{cont}' appears again, asking you to press '{cont}' to show the next display.\n\n\
             To respond as fast as possible, please keep a finger resting on the '{cont}' key.\n\n\
             Press '{cont}' to continue ...\n\n\
             Press '{back}' to go back ..."
        ),
        format!(
            "You can take breaks between trials or blocks whenever you need.\n\n\
             Before the experiment proper begins there are some practice trials.\n\n\
             During practice an additional hint is shown at the top of the screen.\n\n\
             These hints will not be shown in the experiment itself.\n\n\
             Good luck!\n\n\
             If you have understood the instructions, press '{cont}' to start the practice trials ...\n\n\
             Press '{back}' to go back ..."
        ),
    ]
}

/// Screen composition for one session.
#[derive(Debug, Clone)]
pub struct Screens {
    color: Rgba,
    highlight: Rgba,
    background: Rgba,
    stim_size: f32,
    text_height: f32,
    wrap_width: f32,
    help_anchor: Point,
    cont: String,
    back: String,
    rows: usize,
    cols: usize,
    pages: Vec<String>,
}

impl Screens {
    pub fn new(config: &ExperimentConfig, surface: SurfaceGeometry) -> Self {
        let look = &config.appearance;
        Self {
            color: look.color,
            highlight: look.highlight_color,
            background: look.background,
            stim_size: look.stim_size_cm,
            text_height: look.text_height_cm,
            wrap_width: surface.width_cm * WRAP_FRACTION,
            help_anchor: Point::new(0.0, surface.half_height() - config.grid.spacing_cm / 2.0),
            cont: config.keys.continue_label(),
            back: config.keys.return_label(),
            rows: config.grid.rows,
            cols: config.grid.cols,
            pages: instruction_pages(config),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn begin(&self, scene: &mut Scene) {
        scene.clear(self.background);
    }

    fn centred(&self, scene: &mut Scene, content: impl Into<String>) {
        scene.text(content, Point::ORIGIN, self.text_height, self.color, self.wrap_width);
    }

    fn help(&self, scene: &mut Scene, content: impl Into<String>) {
        scene.text(content, self.help_anchor, self.text_height, self.color, self.wrap_width);
    }

    pub fn instructions(&self, scene: &mut Scene, page: usize) {
        self.begin(scene);
        if let Some(text) = self.pages.get(page) {
            self.centred(scene, text.as_str());
        }
    }

    pub fn cue(&self, scene: &mut Scene, training: bool) {
        self.begin(scene);
        self.centred(scene, format!("'{}'", self.cont));
        if training {
            self.help(
                scene,
                format!("Press '{}' to show the next display.", self.cont),
            );
        }
    }

    pub fn search(&self, scene: &mut Scene, pool: &StimulusPool, training: bool) {
        self.begin(scene);
        pool.draw(scene);
        if training {
            self.help(
                scene,
                format!(
                    "Find the different smiley as fast as possible and press '{}' once you have found it.",
                    self.cont
                ),
            );
        }
    }

    /// Localisation grid: a filled square on every position plus row and
    /// column numbers, the axis being entered in the highlight colour.
    pub fn grid(&self, scene: &mut Scene, grid: &GridLayout, axis: Axis, training: bool) {
        self.begin(scene);
        if training {
            let help = match axis {
                Axis::Row => format!(
                    "In which row was the different smiley? Use the keys '1' to '{}'.",
                    self.rows
                ),
                Axis::Column => format!(
                    "In which column was the different smiley? Use the keys '1' to '{}'.",
                    self.cols
                ),
            };
            self.help(scene, help);
        }

        let (row_color, col_color) = match axis {
            Axis::Row => (self.highlight, self.color),
            Axis::Column => (self.color, self.highlight),
        };
        for (label, anchor) in grid.column_label_positions() {
            scene.text(label.to_string(), anchor, self.text_height, col_color, self.wrap_width);
        }
        for (label, anchor) in grid.row_label_positions() {
            scene.text(label.to_string(), anchor, self.text_height, row_color, self.wrap_width);
        }
        for &center in grid.positions() {
            scene.push(DrawCommand::Rect {
                center,
                width: self.stim_size,
                height: self.stim_size,
                color: self.color,
            });
        }
    }

    pub fn feedback(&self, scene: &mut Scene, runner: &TrialRunner) {
        self.begin(scene);
        let verdict = if runner.accuracy() {
            "Your answer is correct."
        } else {
            "Your answer is wrong."
        };
        if !runner.shows_solution() {
            self.centred(scene, verdict);
            return;
        }
        let target = runner.target_cell();
        let (row, col) = runner
            .response()
            .map_or((0, 0), |cell| (cell.row, cell.col));
        self.centred(
            scene,
            format!(
                "{verdict}\n\nYou answered row: {row} and column: {col}.\n\n\
                 The correct answer is row: {} and column: {}.",
                target.row, target.col
            ),
        );
    }

    /// The screen for the trial state the runner is in.
    pub fn trial(
        &self,
        scene: &mut Scene,
        runner: &TrialRunner,
        pool: &StimulusPool,
        grid: &GridLayout,
    ) {
        let training = runner.is_training();
        let state = runner.state();
        if state.shows_faces() {
            self.search(scene, pool, training);
        } else if state.shows_grid() {
            let axis = if state == TrialState::AwaitRowResponse {
                Axis::Row
            } else {
                Axis::Column
            };
            self.grid(scene, grid, axis, training);
        } else {
            match state {
                TrialState::ArmCue => self.cue(scene, training),
                TrialState::Feedback => self.feedback(scene, runner),
                _ => self.begin(scene),
            }
        }
    }

    pub fn training_complete(&self, scene: &mut Scene) {
        self.begin(scene);
        self.centred(
            scene,
            format!(
                "Practice completed successfully.\n\n\
                 Please remember to keep a finger on the '{cont}' key and to respond as fast as possible.\n\n\
                 Press '{cont}' to start the experiment.",
                cont = self.cont
            ),
        );
    }

    pub fn block_intro(&self, scene: &mut Scene, block: usize, num_blocks: usize) {
        self.begin(scene);
        self.centred(
            scene,
            format!(
                "Block: {block} of {num_blocks}.\n\n\
                 When you are ready, press '{}' to start the next block.",
                self.cont
            ),
        );
    }

    pub fn closing(&self, scene: &mut Scene) {
        self.begin(scene);
        self.centred(
            scene,
            format!(
                "The experiment is over.\n\n\
                 Thank you for taking part!\n\n\
                 In this experiment you searched for faces with a positive or negative expression among varying numbers of neutral faces.\n\n\
                 By analysing reaction times as a function of the emotional expression and the number of neutral faces, \
                 the experiment examines how emotional facial expressions guide attention.\n\n\
                 We want to find out whether negative or positive expressions draw attention to different degrees.\n\n\
                 Press '{}' to close the window.",
                self.back
            ),
        );
    }

    /// Empty frame in the background colour.
    pub fn blank(&self, scene: &mut Scene) {
        self.begin(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::FaceStyle;
    use crate::trial::FeedbackTiming;
    use facesearch_core::{Brush, Expression, TrialCondition};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fixture() -> (ExperimentConfig, SurfaceGeometry, GridLayout) {
        let config = ExperimentConfig::default();
        let surface = SurfaceGeometry::from_pixels(1920, 1080, 53.5).unwrap();
        let grid = GridLayout::new(surface, 6, 6, 2.12).unwrap();
        (config, surface, grid)
    }

    fn text_colors(scene: &Scene, label: &str) -> Vec<Rgba> {
        scene
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { content, color, .. } if content == label => Some(*color),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn pages_mention_the_configured_keys() {
        let mut config = ExperimentConfig::default();
        config.keys.continue_key = 'n';
        config.keys.return_key = 'm';
        let pages = instruction_pages(&config);
        assert_eq!(pages.len(), 4);
        assert!(pages.iter().all(|p| p.contains("'N'")));
        assert!(!pages[0].contains("'M'"));
        assert!(pages[1..].iter().all(|p| p.contains("'M'")));
        assert!(pages[1].contains("'1' to '6'"));
    }

    #[test]
    fn grid_highlights_the_axis_being_entered() {
        let (config, surface, grid) = fixture();
        let screens = Screens::new(&config, surface);
        let mut scene = Scene::default();
        let color = config.appearance.color;
        let highlight = config.appearance.highlight_color;

        screens.grid(&mut scene, &grid, Axis::Row, false);
        let rects = scene
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
            .count();
        assert_eq!(rects, 36);
        // every digit appears once as a row label and once as a column label
        assert_eq!(text_colors(&scene, "3"), vec![color, highlight]);
        assert_eq!(scene.texts().count(), 12);

        screens.grid(&mut scene, &grid, Axis::Column, true);
        assert_eq!(text_colors(&scene, "3"), vec![highlight, color]);
        assert!(scene.contains_text("In which column"));
    }

    #[test]
    fn training_adds_help_lines() {
        let (config, surface, _) = fixture();
        let screens = Screens::new(&config, surface);
        let mut scene = Scene::default();

        screens.cue(&mut scene, false);
        assert_eq!(scene.texts().collect::<Vec<_>>(), vec!["'B'"]);
        screens.cue(&mut scene, true);
        assert_eq!(scene.texts().count(), 2);
        assert!(scene.contains_text("show the next display"));
    }

    #[test]
    fn trial_screen_follows_runner_state() {
        let (config, surface, grid) = fixture();
        let screens = Screens::new(&config, surface);
        let style = FaceStyle::new(1.3, config.appearance.color);
        let mut pool = StimulusPool::preload(19, style).unwrap();
        let mut runner = TrialRunner::new(grid.len(), FeedbackTiming::from(&config.timing));
        let mut rng = StdRng::seed_from_u64(1);
        let mut scene = Scene::default();

        runner
            .begin(
                TrialCondition::new(7, Expression::Positive),
                true,
                &grid,
                &mut pool,
                &mut rng,
            )
            .unwrap();
        runner.continue_pressed(0);
        screens.trial(&mut scene, &runner, &pool, &grid);
        let heads = scene
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Circle { brush: Brush::Stroke { .. }, .. }))
            .count();
        assert_eq!(heads, 7);
        assert!(scene.contains_text("Find the different smiley"));

        runner.frame_presented(0);
        runner.continue_pressed(1);
        let target = runner.target_cell();
        let wrong_col = target.col % 6 + 1;
        runner.digit_pressed(target.row as u8, 2);
        runner.digit_pressed(wrong_col as u8, 2);
        runner.update(1_000_000_000);
        assert_eq!(runner.state(), TrialState::Feedback);

        screens.trial(&mut scene, &runner, &pool, &grid);
        assert!(scene.contains_text("Your answer is wrong."));
        assert!(scene.contains_text(&format!(
            "You answered row: {} and column: {wrong_col}.",
            target.row
        )));
        assert!(scene.contains_text(&format!(
            "The correct answer is row: {} and column: {}.",
            target.row, target.col
        )));
    }

    #[test]
    fn response_states_show_the_grid_with_the_right_axis() {
        let (config, surface, _) = fixture();
        let grid = GridLayout::new(surface, 3, 5, 2.12).unwrap();
        let screens = Screens::new(&config, surface);
        let style = FaceStyle::new(1.3, config.appearance.color);
        let mut pool = StimulusPool::preload(4, style).unwrap();
        let mut runner = TrialRunner::new(grid.len(), FeedbackTiming::from(&config.timing));
        let mut rng = StdRng::seed_from_u64(9);
        let mut scene = Scene::default();
        let (color, highlight) = (config.appearance.color, config.appearance.highlight_color);

        runner
            .begin(
                TrialCondition::new(2, Expression::Negative),
                false,
                &grid,
                &mut pool,
                &mut rng,
            )
            .unwrap();
        runner.continue_pressed(0);
        runner.frame_presented(0);
        runner.continue_pressed(1);

        let target = runner.target_cell();
        let expected = [
            (TrialState::AwaitRowResponse, color),
            (TrialState::AwaitColResponse, highlight),
            (TrialState::Score, highlight),
        ];
        for (i, (state, label_color)) in expected.into_iter().enumerate() {
            assert_eq!(runner.state(), state);
            screens.trial(&mut scene, &runner, &pool, &grid);
            let rects = scene
                .commands
                .iter()
                .filter(|c| matches!(c, DrawCommand::Rect { .. }))
                .count();
            assert_eq!(rects, 15);
            assert!(!scene.commands.iter().any(|c| matches!(c, DrawCommand::Circle { .. })));
            // only columns go up to five
            assert_eq!(text_colors(&scene, "5"), vec![label_color]);
            match i {
                0 => assert!(runner.digit_pressed(target.row as u8, 2)),
                1 => assert!(runner.digit_pressed(target.col as u8, 2)),
                _ => {}
            }
        }
    }

    #[test]
    fn block_and_closing_screens() {
        let (config, surface, _) = fixture();
        let screens = Screens::new(&config, surface);
        let mut scene = Scene::default();

        screens.block_intro(&mut scene, 2, 8);
        assert!(scene.contains_text("Block: 2 of 8."));
        screens.closing(&mut scene);
        assert!(scene.contains_text("Press 'V' to close the window."));
        screens.instructions(&mut scene, 9);
        assert!(scene.is_empty());
        assert_eq!(screens.page_count(), 4);
    }
}
