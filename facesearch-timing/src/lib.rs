pub mod timer;

pub use timer::{FrameTimingStats, HighPrecisionTimer, ManualTimer, Timer, secs_to_ns};
