pub mod blocks;
pub mod config;
pub mod persist;
pub mod screens;
pub mod state;
pub mod stimulus;
pub mod training;
pub mod trial;
pub use blocks::{BlockController, build_conditions};
pub use config::{ConfigError, ExperimentConfig};
pub use persist::{CsvResultsWriter, MemorySink, PersistError, ResultRecord, ResultSink, read_results};
pub use screens::{Axis, Screens, instruction_pages};
pub use state::{ExperimentEvent, ExperimentStateMachine, SetupError};
pub use stimulus::{FaceAssembly, FaceStyle, StimulusError, StimulusPool};
pub use training::TrainingController;
pub use trial::{FeedbackTiming, TrialError, TrialRunner};
