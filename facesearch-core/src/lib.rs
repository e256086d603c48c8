pub mod geometry;
pub mod participant;
pub mod phase;
pub mod scene;
pub mod stimulus;
pub mod trial;

pub use geometry::{
    ARC_SEGMENTS, GeometryError, GridLayout, Point, SurfaceGeometry, arc_vertices,
    calculate_positions,
};
pub use participant::{
    Handedness, ParticipantError, ParticipantInfo, Sex, Vision, validate_sub_id,
};
pub use phase::SessionPhase;
pub use scene::{Brush, DrawCommand, Rgba, Scene};
pub use stimulus::Expression;
pub use trial::{Cell, CellParseError, TrialCondition, TrialResult, TrialState};
