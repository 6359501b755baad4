//! Packing tool execution
//!
//! One external packing run per job definition: the rendered input goes to
//! the tool on stdin, stdout is captured to an `output` file, and success
//! is inferred from the existence of the declared output structure, not
//! the exit status. Failed jobs are skipped; the batch always runs to the
//! end. Afterwards every distinct member structure is archived exactly
//! once, and the input files plus the stdout capture are cleaned up.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::convert::archive_file;
use crate::job::JobDefinition;
use crate::process::{ExternalProcess, Invocation, ProcessError};
use crate::structure::{FileStage, StructureFile, StructureFormat};

/// Name of the stdout capture file, mirroring `packmol < job.inp > output`.
const STDOUT_CAPTURE: &str = "output";

/// Per-job packing errors; isolated, never abort the batch.
#[derive(Debug, Error)]
pub enum PackingError {
    #[error("failed to write input file for job '{job}': {source}")]
    WriteInput {
        job: String,
        #[source]
        source: std::io::Error,
    },

    #[error("packing tool produced no output file '{output}' for job '{job}'")]
    OutputMissing { job: String, output: String },
}

/// Result of one packing batch.
#[derive(Debug, Default)]
pub struct PackingBatch {
    /// Packed structures, one per successful job.
    pub packed: Vec<StructureFile>,
    /// Per-job failures, by job name.
    pub failures: Vec<(String, PackingError)>,
}

/// Runs the packing tool for a prebuilt job set.
pub struct PackingRunner<'a> {
    tool: &'a str,
    process: &'a dyn ExternalProcess,
    working_dir: PathBuf,
}

impl<'a> PackingRunner<'a> {
    pub fn new(tool: &'a str, process: &'a dyn ExternalProcess, working_dir: &Path) -> Self {
        Self {
            tool,
            process,
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// Run one job: write its input, invoke the tool, check for the
    /// declared output file.
    fn run_job(
        &self,
        job: &JobDefinition,
    ) -> Result<Result<StructureFile, PackingError>, ProcessError> {
        let input_path = self.working_dir.join(job.input_file_name());
        let input_text = job.render_input();
        if let Err(source) = fs::write(&input_path, &input_text) {
            return Ok(Err(PackingError::WriteInput {
                job: job.name.clone(),
                source,
            }));
        }

        let invocation = Invocation::new(self.tool, &[])
            .with_stdin(input_text.into_bytes())
            .with_cwd(&self.working_dir);
        let output = self.process.run(&invocation)?;

        // The tool's exit status is not trustworthy; its stdout is kept for
        // inspection and success is judged by the declared output file.
        let _ = fs::write(self.working_dir.join(STDOUT_CAPTURE), output.stdout.as_bytes());

        let output_path = self.working_dir.join(job.output_file_name());
        if !output_path.exists() {
            return Ok(Err(PackingError::OutputMissing {
                job: job.name.clone(),
                output: job.output_file_name(),
            }));
        }

        Ok(Ok(StructureFile {
            base_name: job.name.clone(),
            format: StructureFormat::Pdb,
            path: output_path,
            stage: FileStage::Normalized,
        }))
    }

    /// Run the whole job set, then archive each distinct member structure
    /// exactly once and clean up input files and the stdout capture.
    pub fn run_batch(
        &self,
        jobs: &[JobDefinition],
        archive_dir: &Path,
    ) -> Result<PackingBatch, ProcessError> {
        let mut batch = PackingBatch::default();

        for job in jobs {
            match self.run_job(job)? {
                Ok(packed) => {
                    info!(job = %job.name, output = %packed.file_name(), "packed");
                    batch.packed.push(packed);
                }
                Err(err) => {
                    warn!(job = %job.name, error = %err, "packing failed, skipping job");
                    batch.failures.push((job.name.clone(), err));
                }
            }
            let _ = fs::remove_file(self.working_dir.join(job.input_file_name()));
        }

        // Archival is a set operation over distinct members, not per-job: a
        // structure used by several pairs moves exactly once.
        let members: BTreeSet<&str> = jobs
            .iter()
            .flat_map(|j| j.members.iter().map(String::as_str))
            .collect();
        for member in members {
            let path = self.working_dir.join(member);
            if !path.exists() {
                // Already archived by an earlier run.
                continue;
            }
            if let Err(err) = archive_file(&path, archive_dir) {
                warn!(member, error = %err, "failed to archive member structure");
            }
        }

        let _ = fs::remove_file(self.working_dir.join(STDOUT_CAPTURE));
        Ok(batch)
    }
}
