use crate::stimulus::Expression;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Trial state machine states, in the order a trial walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    ArmCue,
    Display,
    AwaitDetection,
    AwaitRowResponse,
    AwaitColResponse,
    Score,
    Feedback,
    Done,
}

impl TrialState {
    /// Whether the search display (faces) is what the participant sees.
    pub fn shows_faces(&self) -> bool {
        matches!(self, Self::Display | Self::AwaitDetection)
    }

    /// Whether the localisation grid is what the participant sees.
    pub fn shows_grid(&self) -> bool {
        matches!(
            self,
            Self::AwaitRowResponse | Self::AwaitColResponse | Self::Score
        )
    }
}

/// 1-based grid coordinate. Written as the pair literal `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected a `(row, col)` pair, got {0:?}")]
pub struct CellParseError(pub String);

impl FromStr for Cell {
    type Err = CellParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CellParseError(s.to_string());
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(err)?;
        let (row, col) = inner.split_once(',').ok_or_else(err)?;
        Ok(Cell {
            row: row.trim().parse().map_err(|_| err())?,
            col: col.trim().parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One (set size, target expression) combination of the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialCondition {
    pub set_size: usize,
    pub target: Expression,
}

impl TrialCondition {
    pub const fn new(set_size: usize, target: Expression) -> Self {
        Self { set_size, target }
    }
}

/// Recorded result per trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub block: usize,
    pub trial_num: usize,
    pub set_size: usize,
    pub target_state: Expression,
    pub target_position: Cell,
    /// Seconds from display onset to the detection key press.
    pub reaction_time: f64,
    pub response: Cell,
    pub accuracy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_literal_round_trips() {
        let cell = Cell::new(3, 2);
        assert_eq!(cell.to_string(), "(3, 2)");
        assert_eq!("(3, 2)".parse::<Cell>(), Ok(cell));
        assert_eq!(" ( 9 ,1 ) ".parse::<Cell>(), Ok(Cell::new(9, 1)));
    }

    #[test]
    fn malformed_cell_literals_are_rejected() {
        for bad in ["3, 2", "(3 2)", "(a, 2)", "(3, )", ""] {
            assert!(bad.parse::<Cell>().is_err(), "{bad:?} parsed");
        }
    }

    #[test]
    fn result_serializes_cells_as_literals() {
        let result = TrialResult {
            block: 1,
            trial_num: 4,
            set_size: 7,
            target_state: Expression::Negative,
            target_position: Cell::new(3, 2),
            reaction_time: 0.8125,
            response: Cell::new(3, 3),
            accuracy: false,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""target_position":"(3, 2)""#));
        assert!(json.contains(r#""target_state":"negative""#));
        let back: TrialResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn only_search_states_show_faces() {
        assert!(TrialState::Display.shows_faces());
        assert!(TrialState::AwaitDetection.shows_faces());
        assert!(!TrialState::ArmCue.shows_faces());
        assert!(TrialState::AwaitColResponse.shows_grid());
        assert!(!TrialState::Feedback.shows_grid());
    }
}
