//! Batch job staging
//!
//! One directory per packed structure under the staging root, holding the
//! coordinate file and a rendered `submit.sh` with the SLURM resource
//! directives baked in. Directory creation is idempotent, but a directory
//! that already carries a submission script is reported as already staged
//! and left byte-for-byte untouched: re-staging must never silently
//! overwrite an existing submission artifact.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{SlurmConfig, ToolsConfig};
use crate::state::StagedJobState;
use crate::structure::StructureFile;

/// Fixed name of the submission script inside every staged directory.
pub const SUBMIT_SCRIPT: &str = "submit.sh";

/// A staged job directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedJob {
    /// Packed-structure base name; also the SLURM job name.
    pub name: String,
    /// The job's directory under the staging root.
    pub dir: PathBuf,
    pub state: StagedJobState,
}

/// What staging did for one structure.
#[derive(Debug)]
pub enum StagingOutcome {
    /// Freshly populated.
    Staged(StagedJob),
    /// Directory already carried a submission script; nothing was touched.
    AlreadyStaged(StagedJob),
}

impl StagingOutcome {
    pub fn job(&self) -> &StagedJob {
        match self {
            StagingOutcome::Staged(job) | StagingOutcome::AlreadyStaged(job) => job,
        }
    }
}

/// Per-item staging errors; isolated across the batch.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create job directory {dir}: {source}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy coordinate file {file} into {dir}: {source}")]
    CopyCoordinates {
        file: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write submission script in {dir}: {source}")]
    WriteScript {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one staging batch.
#[derive(Debug, Default)]
pub struct StagingBatch {
    pub outcomes: Vec<StagingOutcome>,
    pub failures: Vec<(String, StagingError)>,
}

/// Creates and populates per-job submission directories.
pub struct JobStager<'a> {
    slurm: &'a SlurmConfig,
    tools: &'a ToolsConfig,
    staging_root: PathBuf,
}

impl<'a> JobStager<'a> {
    pub fn new(slurm: &'a SlurmConfig, tools: &'a ToolsConfig, staging_root: &Path) -> Self {
        Self {
            slurm,
            tools,
            staging_root: staging_root.to_path_buf(),
        }
    }

    /// Render the submission script for one job.
    pub fn render_script(&self, job_name: &str, coordinate_file: &str) -> String {
        format!(
            "#!/bin/bash\n\
             #SBATCH -N {nodes}\n\
             #SBATCH --tasks-per-node={tasks}\n\
             #SBATCH --mem-per-cpu={mem}\n\
             #SBATCH -t {time}\n\
             #SBATCH -J {job_name}\n\
             #SBATCH -o {job_name}.o\n\
             {conformer} {coordinate_file} {options} > result.out\n",
            nodes = self.slurm.nodes,
            tasks = self.slurm.tasks_per_node,
            mem = self.slurm.mem_per_cpu,
            time = self.slurm.time,
            conformer = self.tools.conformer,
            options = self.tools.conformer_options,
        )
    }

    /// Stage one packed structure: directory, coordinate copy, script.
    pub fn stage(&self, structure: &StructureFile) -> Result<StagingOutcome, StagingError> {
        let dir = self.staging_root.join(&structure.base_name);
        fs::create_dir_all(&dir).map_err(|source| StagingError::CreateDir {
            dir: dir.clone(),
            source,
        })?;

        let script_path = dir.join(SUBMIT_SCRIPT);
        if script_path.exists() {
            warn!(job = %structure.base_name, "already staged, leaving directory untouched");
            return Ok(StagingOutcome::AlreadyStaged(StagedJob {
                name: structure.base_name.clone(),
                dir,
                state: StagedJobState::Staged,
            }));
        }

        let coordinate_file = structure.file_name();
        fs::copy(&structure.path, dir.join(&coordinate_file)).map_err(|source| {
            StagingError::CopyCoordinates {
                file: coordinate_file.clone(),
                dir: dir.clone(),
                source,
            }
        })?;

        let script = self.render_script(&structure.base_name, &coordinate_file);
        fs::write(&script_path, script).map_err(|source| StagingError::WriteScript {
            dir: dir.clone(),
            source,
        })?;
        set_owner_executable(&script_path).map_err(|source| StagingError::WriteScript {
            dir: dir.clone(),
            source,
        })?;

        info!(job = %structure.base_name, dir = %dir.display(), "staged");
        Ok(StagingOutcome::Staged(StagedJob {
            name: structure.base_name.clone(),
            dir,
            state: StagedJobState::Staged,
        }))
    }

    /// Stage a batch of packed structures, isolating per-item failures.
    pub fn stage_all(&self, structures: &[StructureFile]) -> StagingBatch {
        let mut batch = StagingBatch::default();
        for structure in structures {
            match self.stage(structure) {
                Ok(outcome) => batch.outcomes.push(outcome),
                Err(err) => {
                    warn!(job = %structure.base_name, error = %err, "staging failed, skipping");
                    batch.failures.push((structure.base_name.clone(), err));
                }
            }
        }
        batch
    }
}

#[cfg(unix)]
fn set_owner_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_owner_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
