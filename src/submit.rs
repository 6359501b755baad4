//! Batch submission
//!
//! Walks the staging root, enters each job directory, and hands the fixed
//! submission script to the scheduler. The working directory is changed
//! through a scoped guard whose Drop restores the previous directory even
//! when submission errors, so one failed job can never leave the rest of
//! the batch running from the wrong place. The scheduler's reply is parsed
//! for the assigned job id, which is persisted in the job directory.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::process::{ExternalProcess, Invocation, ProcessError};
use crate::staging::SUBMIT_SCRIPT;
use crate::state::{StateError, SubmissionRecord};

/// Restores the previous working directory on drop.
pub struct CwdGuard {
    previous: PathBuf,
}

impl CwdGuard {
    /// Change into `dir`, remembering where we came from.
    pub fn enter(dir: &Path) -> io::Result<Self> {
        let previous = env::current_dir()?;
        env::set_current_dir(dir)?;
        Ok(Self { previous })
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        // Restoration must survive submission errors; nothing useful can
        // be done if it fails here.
        let _ = env::set_current_dir(&self.previous);
    }
}

/// Per-directory submission errors; isolated across the batch.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to enter job directory {dir}: {source}")]
    EnterDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("scheduler exited with code {exit_code}: {diagnostics}")]
    SchedulerFailed { exit_code: i32, diagnostics: String },

    #[error("failed to write submission record: {0}")]
    Record(#[from] StateError),

    #[error("failed to read staging root {root}: {source}")]
    ReadRoot {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// What happened to one staged directory.
#[derive(Debug)]
pub enum SubmissionStatus {
    /// Scheduler accepted the job.
    Submitted(SubmissionRecord),
    /// Directory already carried a submission record; never revisited.
    AlreadySubmitted(SubmissionRecord),
    /// Submission failed; remaining directories are still attempted.
    Failed(SubmissionError),
}

/// Outcome for one staged job directory.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub job_name: String,
    pub status: SubmissionStatus,
}

/// Hands staged jobs to the external scheduler.
pub struct JobSubmitter<'a> {
    scheduler: &'a str,
    process: &'a dyn ExternalProcess,
}

impl<'a> JobSubmitter<'a> {
    pub fn new(scheduler: &'a str, process: &'a dyn ExternalProcess) -> Self {
        Self { scheduler, process }
    }

    /// Submit one staged directory from inside it.
    fn submit_one(&self, dir: &Path) -> Result<Result<SubmissionRecord, SubmissionError>, ProcessError> {
        let job_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let guard = match CwdGuard::enter(dir) {
            Ok(guard) => guard,
            Err(source) => {
                return Ok(Err(SubmissionError::EnterDir {
                    dir: dir.to_path_buf(),
                    source,
                }))
            }
        };

        let output = self.process.run(&Invocation::new(self.scheduler, &[SUBMIT_SCRIPT]))?;
        drop(guard);

        if !output.success() {
            return Ok(Err(SubmissionError::SchedulerFailed {
                exit_code: output.exit_code,
                diagnostics: output.stderr.trim().to_string(),
            }));
        }

        let scheduler_job_id = parse_scheduler_job_id(&output.stdout);
        let record = SubmissionRecord::submitted(job_name, scheduler_job_id);
        if let Err(err) = record.write_to_dir(dir) {
            return Ok(Err(SubmissionError::Record(err)));
        }
        Ok(Ok(record))
    }

    /// Submit every staged directory directly under the staging root, in
    /// name order. Non-directory entries are ignored; per-directory
    /// failures are logged and the batch continues, but an unreadable
    /// staging root is fatal.
    pub fn submit_all(
        &self,
        staging_root: &Path,
    ) -> Result<Vec<SubmissionOutcome>, SubmissionError> {
        let entries =
            std::fs::read_dir(staging_root).map_err(|source| SubmissionError::ReadRoot {
                root: staging_root.to_path_buf(),
                source,
            })?;
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut outcomes = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let job_name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            // Submitted jobs are terminal and never revisited.
            if let Ok(Some(record)) = SubmissionRecord::load_from_dir(&dir) {
                info!(job = %job_name, "already submitted, skipping");
                outcomes.push(SubmissionOutcome {
                    job_name,
                    status: SubmissionStatus::AlreadySubmitted(record),
                });
                continue;
            }

            match self.submit_one(&dir)? {
                Ok(record) => {
                    info!(
                        job = %job_name,
                        scheduler_job_id = record.scheduler_job_id.as_deref().unwrap_or("-"),
                        "submitted"
                    );
                    outcomes.push(SubmissionOutcome {
                        job_name,
                        status: SubmissionStatus::Submitted(record),
                    });
                }
                Err(err) => {
                    warn!(job = %job_name, error = %err, "submission failed, continuing");
                    outcomes.push(SubmissionOutcome {
                        job_name,
                        status: SubmissionStatus::Failed(err),
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

/// Parse the scheduler's `Submitted batch job <id>` reply.
pub fn parse_scheduler_job_id(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find(|line| line.starts_with("Submitted batch job "))
        .and_then(|line| line.split_whitespace().last())
        .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}
