use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Emotional expression of a schematic face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Positive,
    Negative,
    Neutral,
}

impl Expression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Positive => "positive",
            Expression::Negative => "negative",
            Expression::Neutral => "neutral",
        }
    }

    /// Distractors are always neutral; only emotional faces can be targets.
    pub fn is_emotional(&self) -> bool {
        !matches!(self, Expression::Neutral)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Expression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Expression::Positive),
            "negative" => Ok(Expression::Negative),
            "neutral" => Ok(Expression::Neutral),
            other => Err(format!("unknown expression {other:?}")),
        }
    }
}
