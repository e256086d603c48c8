use facesearch_core::{Expression, Rgba};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest row/column count the digit-key localisation input can address.
pub const MAX_GRID_DIM: usize = 9;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("rows and cols must be between 1 and {MAX_GRID_DIM} (got {rows}x{cols})")]
    GridDimensions { rows: usize, cols: usize },
    #[error("at least one set size is required")]
    NoSetSizes,
    #[error("set size {size} must be between 1 and the {capacity} grid positions")]
    SetSize { size: usize, capacity: usize },
    #[error("training set size {size} must be between 1 and the {capacity} grid positions")]
    TrainingSetSize { size: usize, capacity: usize },
    #[error("training quota must be at least 1")]
    TrainingQuota,
    #[error("trials per condition must be at least 1")]
    TrialsPerCondition,
    #[error("at least one target state is required")]
    NoTargetStates,
    #[error("target state {0} is not an emotional expression")]
    NeutralTarget(Expression),
    #[error("continue and return keys must differ (both {0:?})")]
    SameKeys(char),
    #[error("key {0:?} collides with the digit keys used for localisation")]
    DigitKey(char),
    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f32 },
    #[error("{name} must not be negative (got {value})")]
    NegativeDuration { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    /// Distance between neighbouring positions, in cm.
    pub spacing_cm: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 6,
            cols: 6,
            spacing_cm: 2.12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    pub set_sizes: Vec<usize>,
    pub training_set_size: usize,
    /// Correct training trials required before the main blocks start.
    pub training_quota: usize,
    pub trials_per_condition: usize,
    pub target_states: Vec<Expression>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            set_sizes: vec![7, 11, 15, 19],
            training_set_size: 3,
            training_quota: 4,
            trials_per_condition: 30,
            target_states: vec![Expression::Positive, Expression::Negative],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Advances instructions and prompts, and signals that the target was found.
    pub continue_key: char,
    /// Goes back one instruction page and closes the final screen.
    pub return_key: char,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            continue_key: 'b',
            return_key: 'v',
        }
    }
}

impl KeyConfig {
    pub fn continue_label(&self) -> String {
        self.continue_key.to_uppercase().to_string()
    }

    pub fn return_label(&self) -> String {
        self.return_key.to_uppercase().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub color: Rgba,
    /// Colour of the axis currently being entered in the localisation grid.
    pub highlight_color: Rgba,
    pub background: Rgba,
    /// Face diameter and grid square size, in cm.
    pub stim_size_cm: f32,
    pub text_height_cm: f32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            color: [229, 229, 229, 255],
            highlight_color: [229, 25, 25, 255],
            background: [0, 0, 0, 255],
            stim_size_cm: 1.3,
            text_height_cm: 0.5,
        }
    }
}

/// Durations in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub feedback_delay: f64,
    pub feedback_duration: f64,
    /// Keys are ignored for this long after an instruction page or block
    /// prompt appears.
    pub skip_prot: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            feedback_delay: 0.5,
            feedback_duration: 1.0,
            skip_prot: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Physical width of the monitor, used to convert cm to pixels.
    pub monitor_width_cm: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            monitor_width_cm: 53.5,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub debug_mode: bool,
    pub grid: GridConfig,
    pub trials: TrialConfig,
    pub keys: KeyConfig,
    pub appearance: AppearanceConfig,
    pub timing: TimingConfig,
    pub display: DisplayConfig,
}

impl ExperimentConfig {
    /// Reads a TOML config. A missing file yields the defaults; a file that
    /// cannot be read or parsed is reported and the defaults are used.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(cfg) => return cfg,
                Err(err) => {
                    eprintln!(
                        "Failed to parse config {}: {err}. Using defaults.",
                        path.display()
                    );
                }
            },
            Err(err) => {
                eprintln!(
                    "Failed to read config {}: {err}. Using defaults.",
                    path.display()
                );
            }
        }
        Self::default()
    }

    pub fn grid_capacity(&self) -> usize {
        self.grid.rows * self.grid.cols
    }

    /// Number of face assemblies the session needs.
    pub fn pool_size(&self) -> usize {
        self.trials
            .set_sizes
            .iter()
            .copied()
            .chain(std::iter::once(self.trials.training_set_size))
            .max()
            .unwrap_or(0)
    }

    pub fn total_conditions(&self) -> usize {
        self.trials.set_sizes.len()
            * self.trials.target_states.len()
            * self.trials.trials_per_condition
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (rows, cols) = (self.grid.rows, self.grid.cols);
        if !(1..=MAX_GRID_DIM).contains(&rows) || !(1..=MAX_GRID_DIM).contains(&cols) {
            return Err(ConfigError::GridDimensions { rows, cols });
        }
        let capacity = self.grid_capacity();

        let trials = &self.trials;
        if trials.set_sizes.is_empty() {
            return Err(ConfigError::NoSetSizes);
        }
        if let Some(&size) = trials
            .set_sizes
            .iter()
            .find(|&&s| s == 0 || s > capacity)
        {
            return Err(ConfigError::SetSize { size, capacity });
        }
        if trials.training_set_size == 0 || trials.training_set_size > capacity {
            return Err(ConfigError::TrainingSetSize {
                size: trials.training_set_size,
                capacity,
            });
        }
        if trials.training_quota == 0 {
            return Err(ConfigError::TrainingQuota);
        }
        if trials.trials_per_condition == 0 {
            return Err(ConfigError::TrialsPerCondition);
        }
        if trials.target_states.is_empty() {
            return Err(ConfigError::NoTargetStates);
        }
        if let Some(&state) = trials.target_states.iter().find(|s| !s.is_emotional()) {
            return Err(ConfigError::NeutralTarget(state));
        }

        let keys = &self.keys;
        if keys.continue_key.eq_ignore_ascii_case(&keys.return_key) {
            return Err(ConfigError::SameKeys(keys.continue_key));
        }
        for key in [keys.continue_key, keys.return_key] {
            if key.is_ascii_digit() {
                return Err(ConfigError::DigitKey(key));
            }
        }

        for (name, value) in [
            ("grid.spacing_cm", self.grid.spacing_cm),
            ("appearance.stim_size_cm", self.appearance.stim_size_cm),
            ("appearance.text_height_cm", self.appearance.text_height_cm),
            ("display.monitor_width_cm", self.display.monitor_width_cm),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        for (name, value) in [
            ("timing.feedback_delay", self.timing.feedback_delay),
            ("timing.feedback_duration", self.timing.feedback_duration),
            ("timing.skip_prot", self.timing.skip_prot),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeDuration { name, value });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = ExperimentConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.total_conditions(), 4 * 2 * 30);
        assert_eq!(cfg.pool_size(), 19);
        assert_eq!(cfg.keys.continue_label(), "B");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: ExperimentConfig = toml::from_str(
            r#"
            debug_mode = true

            [grid]
            rows = 4

            [trials]
            set_sizes = [3, 5]
            target_states = ["negative"]

            [keys]
            continue_key = "n"
            "#,
        )
        .unwrap();
        assert!(cfg.debug_mode);
        assert_eq!(cfg.grid.rows, 4);
        assert_eq!(cfg.grid.cols, 6);
        assert_eq!(cfg.trials.set_sizes, vec![3, 5]);
        assert_eq!(cfg.trials.target_states, vec![Expression::Negative]);
        assert_eq!(cfg.keys.continue_key, 'n');
        assert_eq!(cfg.keys.return_key, 'v');
        assert_eq!(cfg.timing, TimingConfig::default());
    }

    #[test]
    fn serialized_defaults_parse_back() {
        let text = toml::to_string_pretty(&ExperimentConfig::default()).unwrap();
        let parsed: ExperimentConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, ExperimentConfig::default());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(
            ExperimentConfig::load_or_default(&missing),
            ExperimentConfig::default()
        );

        let broken = dir.path().join("broken.toml");
        fs::File::create(&broken)
            .unwrap()
            .write_all(b"[grid\nrows = ")
            .unwrap();
        assert_eq!(
            ExperimentConfig::load_or_default(&broken),
            ExperimentConfig::default()
        );

        let good = dir.path().join("good.toml");
        fs::write(&good, "[grid]\ncols = 3\n").unwrap();
        assert_eq!(ExperimentConfig::load_or_default(&good).grid.cols, 3);
    }

    #[test]
    fn validation_rejects_bad_designs() {
        let mut cfg = ExperimentConfig::default();
        cfg.grid.rows = 10;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::GridDimensions { rows: 10, cols: 6 })
        );

        let mut cfg = ExperimentConfig::default();
        cfg.trials.set_sizes = vec![7, 37];
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::SetSize {
                size: 37,
                capacity: 36
            })
        );

        let mut cfg = ExperimentConfig::default();
        cfg.trials.target_states = vec![Expression::Positive, Expression::Neutral];
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NeutralTarget(Expression::Neutral))
        );

        let mut cfg = ExperimentConfig::default();
        cfg.keys.return_key = 'B';
        assert_eq!(cfg.validate(), Err(ConfigError::SameKeys('b')));

        let mut cfg = ExperimentConfig::default();
        cfg.keys.continue_key = '3';
        assert_eq!(cfg.validate(), Err(ConfigError::DigitKey('3')));

        let mut cfg = ExperimentConfig::default();
        cfg.timing.skip_prot = -0.1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NegativeDuration {
                name: "timing.skip_prot",
                ..
            })
        ));

        let mut cfg = ExperimentConfig::default();
        cfg.trials.training_quota = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::TrainingQuota));
    }
}
