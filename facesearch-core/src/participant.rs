use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vision {
    Normal,
    CorrectedToNormal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl Vision {
    pub const ALL: [Vision; 2] = [Vision::Normal, Vision::CorrectedToNormal];

    pub fn label(&self) -> &'static str {
        match self {
            Vision::Normal => "normal",
            Vision::CorrectedToNormal => "corrected-to-normal",
        }
    }
}

impl Handedness {
    pub const ALL: [Handedness; 2] = [Handedness::Left, Handedness::Right];

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }
}

macro_rules! display_label {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

display_label!(Sex, Vision, Handedness);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParticipantError {
    #[error("subject id must not be empty")]
    EmptyId,
    #[error("subject id {0:?} must not contain path separators")]
    InvalidId(String),
}

/// Participant metadata, attached to every persisted trial row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub sub_id: String,
    pub age: String,
    pub sex: Sex,
    pub vision: Vision,
    pub handedness: Handedness,
}

impl ParticipantInfo {
    pub fn new(
        sub_id: impl Into<String>,
        age: impl Into<String>,
        sex: Sex,
        vision: Vision,
        handedness: Handedness,
    ) -> Result<Self, ParticipantError> {
        let sub_id = sub_id.into().trim().to_string();
        validate_sub_id(&sub_id)?;
        Ok(Self {
            sub_id,
            age: age.into().trim().to_string(),
            sex,
            vision,
            handedness,
        })
    }
}

/// The id ends up in result and log file names.
pub fn validate_sub_id(sub_id: &str) -> Result<(), ParticipantError> {
    if sub_id.is_empty() {
        return Err(ParticipantError::EmptyId);
    }
    if sub_id.contains(['/', '\\']) || sub_id == "." || sub_id == ".." {
        return Err(ParticipantError::InvalidId(sub_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_id_is_trimmed_and_checked() {
        let info = ParticipantInfo::new(
            " 007 ",
            "24",
            Sex::Female,
            Vision::CorrectedToNormal,
            Handedness::Right,
        )
        .unwrap();
        assert_eq!(info.sub_id, "007");

        let err = ParticipantInfo::new("", "24", Sex::Male, Vision::Normal, Handedness::Left);
        assert_eq!(err, Err(ParticipantError::EmptyId));
        assert!(validate_sub_id("../x").is_err());
        assert!(validate_sub_id("a\\b").is_err());
    }

    #[test]
    fn labels_match_serialized_names() {
        assert_eq!(Vision::CorrectedToNormal.to_string(), "corrected-to-normal");
        assert_eq!(
            serde_json::to_string(&Vision::CorrectedToNormal).unwrap(),
            "\"corrected-to-normal\""
        );
        assert_eq!(serde_json::to_string(&Sex::Male).unwrap(), "\"Male\"");
        assert_eq!(serde_json::to_string(&Handedness::Left).unwrap(), "\"left\"");
    }
}
