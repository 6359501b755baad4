//! Staged job lifecycle
//!
//! A staged job moves Pending → Staged → Submitted and is never revisited
//! after submission. The submitter leaves a `submission.json` record in the
//! job directory carrying the scheduler's returned job identifier, so the
//! batch can be queried later instead of being fire-and-forget.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version for submission.json.
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier for submission.json.
pub const SCHEMA_ID: &str = "crestprep/submission@1";

/// Filename of the per-job submission record.
pub const SUBMISSION_RECORD_FILE: &str = "submission.json";

/// Lifecycle state of a staged job directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagedJobState {
    /// Directory created, not yet populated.
    Pending,
    /// Coordinate file and submission script in place.
    Staged,
    /// Handed to the scheduler; terminal.
    Submitted,
}

impl StagedJobState {
    /// Valid transitions only ever move forward.
    pub fn can_transition_to(&self, target: StagedJobState) -> bool {
        matches!(
            (self, target),
            (StagedJobState::Pending, StagedJobState::Staged)
                | (StagedJobState::Staged, StagedJobState::Submitted)
        )
    }

    /// Submitted jobs are never revisited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StagedJobState::Submitted)
    }
}

/// State errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: StagedJobState,
        to: StagedJobState,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent record of one submission attempt (submission.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub schema_version: u32,
    pub schema_id: String,
    /// Staged job name (directory and SLURM job name).
    pub job_name: String,
    /// Scheduler-assigned identifier parsed from the submission reply;
    /// absent when the scheduler accepted the job without a parsable id.
    pub scheduler_job_id: Option<String>,
    pub state: StagedJobState,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// Record for a job the scheduler just accepted.
    pub fn submitted(job_name: impl Into<String>, scheduler_job_id: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            job_name: job_name.into(),
            scheduler_job_id,
            state: StagedJobState::Submitted,
            submitted_at: Utc::now(),
        }
    }

    /// Write the record into a staged job directory.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(SUBMISSION_RECORD_FILE), json)?;
        Ok(())
    }

    /// Load the record from a staged job directory, if present.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>, StateError> {
        let path = dir.join(SUBMISSION_RECORD_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}
