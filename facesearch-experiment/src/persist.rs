//! Per-trial result persistence.

use chrono::Local;
use facesearch_core::{
    Cell, Expression, Handedness, ParticipantInfo, Sex, TrialResult, Vision,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// File-name timestamp, `DDMMYYYY-HHMMSS`.
pub const FILE_TIMESTAMP: &str = "%d%m%Y-%H%M%S";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot write results: {0}")]
    Io(#[from] io::Error),
    #[error("cannot encode results: {0}")]
    Csv(#[from] csv::Error),
}

/// Receives every finished main trial.
pub trait ResultSink {
    fn record(
        &mut self,
        participant: &ParticipantInfo,
        result: &TrialResult,
    ) -> Result<(), PersistError>;
}

/// One CSV row: participant metadata followed by the trial result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub sub_id: String,
    pub age: String,
    pub sex: Sex,
    pub vision: Vision,
    pub handedness: Handedness,
    pub block: usize,
    pub trial: usize,
    pub target_state: Expression,
    pub set_size: usize,
    pub reaction_time: f64,
    pub target_position: Cell,
    pub response: Cell,
    pub accuracy: bool,
}

impl ResultRecord {
    pub fn new(participant: &ParticipantInfo, result: &TrialResult) -> Self {
        Self {
            sub_id: participant.sub_id.clone(),
            age: participant.age.clone(),
            sex: participant.sex,
            vision: participant.vision,
            handedness: participant.handedness,
            block: result.block,
            trial: result.trial_num,
            target_state: result.target_state,
            set_size: result.set_size,
            reaction_time: result.reaction_time,
            target_position: result.target_position,
            response: result.response,
            accuracy: result.accuracy,
        }
    }
}

/// Appends one row per trial to `results_subject_<id>.csv` under the results
/// directory. An existing file from an earlier session is never touched; the
/// session then writes to a timestamped sibling instead.
#[derive(Debug)]
pub struct CsvResultsWriter {
    dir: PathBuf,
    output: Option<PathBuf>,
}

impl CsvResultsWriter {
    pub fn new(data_root: &Path) -> Self {
        Self {
            dir: data_root.join("results"),
            output: None,
        }
    }

    /// The file this session writes to, once the first row is recorded.
    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    fn resolve(&self, sub_id: &str) -> PathBuf {
        let plain = self.dir.join(format!("results_subject_{sub_id}.csv"));
        if !plain.exists() {
            return plain;
        }
        let stamp = Local::now().format(FILE_TIMESTAMP).to_string();
        self.free_sibling(sub_id, &stamp)
    }

    /// `results_subject_<id>_<stamp>.csv`, or with `-1`, `-2`, ... appended
    /// to the stamp when another session already took that name.
    fn free_sibling(&self, sub_id: &str, stamp: &str) -> PathBuf {
        let stamped = self.dir.join(format!("results_subject_{sub_id}_{stamp}.csv"));
        if !stamped.exists() {
            return stamped;
        }
        (1u32..)
            .map(|n| self.dir.join(format!("results_subject_{sub_id}_{stamp}-{n}.csv")))
            .find(|path| !path.exists())
            .unwrap_or(stamped)
    }
}

impl ResultSink for CsvResultsWriter {
    fn record(
        &mut self,
        participant: &ParticipantInfo,
        result: &TrialResult,
    ) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;
        let path = match &self.output {
            Some(path) => path.clone(),
            None => {
                let path = self.resolve(&participant.sub_id);
                self.output = Some(path.clone());
                path
            }
        };

        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(ResultRecord::new(participant, result))?;
        writer.flush()?;
        info!("Data saved to {}", path.display());
        Ok(())
    }
}

/// Keeps results in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<ResultRecord>,
}

impl ResultSink for MemorySink {
    fn record(
        &mut self,
        participant: &ParticipantInfo,
        result: &TrialResult,
    ) -> Result<(), PersistError> {
        self.records.push(ResultRecord::new(participant, result));
        Ok(())
    }
}

/// Reads a results file back.
pub fn read_results(path: &Path) -> Result<Vec<ResultRecord>, PersistError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}
