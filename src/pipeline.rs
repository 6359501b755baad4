//! Pipeline orchestration
//!
//! Sequences the four stages in fixed order: normalize raw structures to
//! PDB, pack every unique pair, convert packed structures to XYZ, then
//! stage and submit one cluster job per packed structure. Each stage fully
//! completes before the next begins; per-item failures inside a stage are
//! logged and skipped, while configuration-level failures (missing tool,
//! naming collision) abort the run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{defaults, PipelineConfig};
use crate::convert::{ConversionBatch, FormatConverter};
use crate::job::{build_job_set, is_pair_name, JobDefinition, JobError};
use crate::packing::{PackingBatch, PackingRunner};
use crate::pair::generate_pairs;
use crate::process::{ExternalProcess, ProcessError};
use crate::staging::{JobStager, StagingBatch, StagingOutcome};
use crate::structure::{list_structures, FileStage, RegistryError, StructureFormat};
use crate::submit::{JobSubmitter, SubmissionError, SubmissionOutcome, SubmissionStatus};

/// Pipeline errors. These abort the run; per-item failures do not reach
/// this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("structure discovery error: {0}")]
    Registry(#[from] RegistryError),

    #[error("external process error: {0}")]
    Process(#[from] ProcessError),

    #[error("job naming error: {0}")]
    Naming(#[from] JobError),

    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Registry(_) => 10,
            PipelineError::Process(_) => 20,
            PipelineError::Naming(_) => 30,
            PipelineError::Submission(_) => 40,
            PipelineError::Io(_) => 1,
        }
    }
}

/// Counts for one full run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub normalized: usize,
    pub normalize_skipped: usize,
    pub normalize_failures: usize,
    pub packed: usize,
    pub packing_failures: usize,
    pub converted: usize,
    pub convert_failures: usize,
    pub staged: usize,
    pub already_staged: usize,
    pub staging_failures: usize,
    pub submitted: usize,
    pub already_submitted: usize,
    pub submission_failures: usize,
}

impl RunSummary {
    /// True when every item in every stage went through cleanly.
    pub fn clean(&self) -> bool {
        self.normalize_failures == 0
            && self.packing_failures == 0
            && self.convert_failures == 0
            && self.staging_failures == 0
            && self.submission_failures == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "normalized {} ({} already normalized, {} failed)",
            self.normalized, self.normalize_skipped, self.normalize_failures
        )?;
        writeln!(f, "packed {} ({} failed)", self.packed, self.packing_failures)?;
        writeln!(
            f,
            "converted {} ({} failed)",
            self.converted, self.convert_failures
        )?;
        writeln!(
            f,
            "staged {} ({} already staged, {} failed)",
            self.staged, self.already_staged, self.staging_failures
        )?;
        write!(
            f,
            "submitted {} ({} already submitted, {} failed)",
            self.submitted, self.already_submitted, self.submission_failures
        )
    }
}

/// The raw formats normalization picks up, in discovery-pass order.
fn raw_formats() -> Vec<StructureFormat> {
    defaults::RAW_FORMATS
        .iter()
        .filter_map(|ext| StructureFormat::from_str(ext).ok())
        .collect()
}

/// Drives the full workflow against one working directory.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    process: &'a dyn ExternalProcess,
    working_dir: PathBuf,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, process: &'a dyn ExternalProcess, working_dir: &Path) -> Self {
        Self {
            config,
            process,
            working_dir: working_dir.to_path_buf(),
        }
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.working_dir.join(name)
    }

    /// Stage 1: convert every raw structure to PDB, archiving consumed
    /// inputs into the originals directory.
    pub fn normalize(&self) -> Result<ConversionBatch, PipelineError> {
        let inputs = list_structures(&self.working_dir, &raw_formats(), FileStage::Raw)?;
        info!(count = inputs.len(), "normalizing raw structures");

        let converter = FormatConverter::new(&self.config.tools.converter, self.process);
        let batch = converter.convert_batch(
            &inputs,
            StructureFormat::Pdb,
            &self.dir(&self.config.dirs.originals),
        )?;
        Ok(batch)
    }

    /// Build the job set for the current set of normalized structures.
    /// This is the whole planning step and performs the naming-collision
    /// check, so it must succeed before any packing tool invocation.
    pub fn plan(&self) -> Result<Vec<JobDefinition>, PipelineError> {
        let structures =
            list_structures(&self.working_dir, &[StructureFormat::Pdb], FileStage::Normalized)?;
        let base_names: Vec<String> = structures.iter().map(|s| s.base_name.clone()).collect();
        let pairs = generate_pairs(&base_names);
        Ok(build_job_set(&pairs, &self.config.packing)?)
    }

    /// Stage 2: run the packing tool for every planned job, archiving
    /// consumed member PDBs.
    pub fn pack(&self) -> Result<PackingBatch, PipelineError> {
        let jobs = self.plan()?;
        info!(count = jobs.len(), "running packing jobs");

        let runner = PackingRunner::new(&self.config.tools.packing, self.process, &self.working_dir);
        let batch = runner.run_batch(&jobs, &self.dir(&self.config.dirs.packed_archive))?;
        Ok(batch)
    }

    /// Stage 3: convert packed PDBs to XYZ, archiving the consumed PDBs.
    pub fn convert_packed(&self) -> Result<ConversionBatch, PipelineError> {
        let inputs =
            list_structures(&self.working_dir, &[StructureFormat::Pdb], FileStage::Normalized)?;
        info!(count = inputs.len(), "converting packed structures to xyz");

        let converter = FormatConverter::new(&self.config.tools.converter, self.process);
        let batch = converter.convert_batch(
            &inputs,
            StructureFormat::Xyz,
            &self.dir(&self.config.dirs.xyz_archive),
        )?;
        Ok(batch)
    }

    /// Stage 4a: stage one directory per packed configuration under the
    /// staging root. Only rendered pair names qualify; a raw xyz input left
    /// behind by a failed normalization is skipped, never promoted into a
    /// job.
    pub fn stage(&self) -> Result<StagingBatch, PipelineError> {
        let discovered =
            list_structures(&self.working_dir, &[StructureFormat::Xyz], FileStage::Normalized)?;
        let (inputs, strays): (Vec<_>, Vec<_>) = discovered
            .into_iter()
            .partition(|s| is_pair_name(&s.base_name));
        for stray in &strays {
            warn!(file = %stray.file_name(), "not a packed configuration, skipping");
        }
        info!(count = inputs.len(), "staging jobs");

        // An unusable staging root is fatal before any job is touched.
        let root = self.dir(&self.config.dirs.staging);
        fs::create_dir_all(&root)?;

        let stager = JobStager::new(&self.config.slurm, &self.config.tools, &root);
        Ok(stager.stage_all(&inputs))
    }

    /// Stage 4b: submit every staged directory.
    pub fn submit(&self) -> Result<Vec<SubmissionOutcome>, PipelineError> {
        let submitter = JobSubmitter::new(&self.config.tools.scheduler, self.process);
        Ok(submitter.submit_all(&self.dir(&self.config.dirs.staging))?)
    }

    /// Run the complete workflow in fixed order.
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        info!("step 1: normalizing input structures");
        let normalize = self.normalize()?;
        summary.normalized = normalize.converted.len();
        summary.normalize_skipped = normalize.skipped.len();
        summary.normalize_failures = normalize.failures.len();

        info!("step 2: packing molecular pairs");
        let packing = self.pack()?;
        summary.packed = packing.packed.len();
        summary.packing_failures = packing.failures.len();

        info!("step 3: converting packed structures");
        let convert = self.convert_packed()?;
        summary.converted = convert.converted.len();
        summary.convert_failures = convert.failures.len();

        info!("step 4: staging and submitting jobs");
        let staging = self.stage()?;
        for outcome in &staging.outcomes {
            match outcome {
                StagingOutcome::Staged(_) => summary.staged += 1,
                StagingOutcome::AlreadyStaged(_) => summary.already_staged += 1,
            }
        }
        summary.staging_failures = staging.failures.len();

        for outcome in self.submit()? {
            match outcome.status {
                SubmissionStatus::Submitted(_) => summary.submitted += 1,
                SubmissionStatus::AlreadySubmitted(_) => summary.already_submitted += 1,
                SubmissionStatus::Failed(_) => summary.submission_failures += 1,
            }
        }

        info!(%summary, "workflow complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockOutcome, MockProcess};

    #[test]
    fn test_plan_orders_jobs_by_discovery() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("water.pdb"), b"").unwrap();
        fs::write(dir.path().join("methane.pdb"), b"").unwrap();

        let config = PipelineConfig::default();
        let mock = MockProcess::new();
        let pipeline = Pipeline::new(&config, &mock, dir.path());

        let jobs = pipeline.plan().unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        // Discovery sorts lexicographically: methane before water.
        assert_eq!(
            names,
            vec!["methane_methane", "water_water", "methane_water"]
        );
    }

    #[test]
    fn test_plan_rejects_naming_hazard_before_any_tool_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sodium_chloride.pdb"), b"").unwrap();

        let config = PipelineConfig::default();
        let mock = MockProcess::new();
        let pipeline = Pipeline::new(&config, &mock, dir.path());

        let result = pipeline.pack();
        assert!(matches!(result, Err(PipelineError::Naming(_))));
        assert_eq!(mock.call_count("packmol"), 0);
    }

    #[test]
    fn test_exit_codes() {
        let err = PipelineError::Naming(JobError::DuplicateJobName("a_b".to_string()));
        assert_eq!(err.exit_code(), 30);

        let err = PipelineError::Submission(SubmissionError::SchedulerFailed {
            exit_code: 1,
            diagnostics: "sbatch: error".to_string(),
        });
        assert_eq!(err.exit_code(), 40);
    }

    #[test]
    fn test_failed_raw_xyz_is_not_staged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.xyz"), b"garbage").unwrap();

        let config = PipelineConfig::default();
        let mock = MockProcess::new();
        mock.script("obabel", MockOutcome::failure(1, "cannot read input"));

        let pipeline = Pipeline::new(&config, &mock, dir.path());
        let summary = pipeline.run().unwrap();

        assert_eq!(summary.normalize_failures, 1);
        assert_eq!(summary.staged, 0);
        assert_eq!(summary.submitted, 0);
        assert!(!summary.clean());
        // The failed input stays visible at the top level, never promoted
        // into a job directory.
        assert!(dir.path().join("bad.xyz").exists());
        assert!(!dir.path().join("crest_calculations").join("bad").exists());
        assert_eq!(mock.call_count("sbatch"), 0);
    }

    #[test]
    fn test_unusable_staging_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_b.xyz"), b"").unwrap();
        // A regular file occupies the staging root.
        fs::write(dir.path().join("crest_calculations"), b"not a directory").unwrap();

        let config = PipelineConfig::default();
        let mock = MockProcess::new();
        let pipeline = Pipeline::new(&config, &mock, dir.path());

        let result = pipeline.stage();
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_passthrough_inputs_not_counted_as_normalized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("water.pdb"), b"ATOM\n").unwrap();

        let config = PipelineConfig::default();
        // The packing tool reports success but leaves no output behind, so
        // the run ends with nothing staged.
        let mock = MockProcess::new();
        let pipeline = Pipeline::new(&config, &mock, dir.path());

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.normalized, 0);
        assert_eq!(summary.normalize_skipped, 1);
        assert_eq!(summary.packing_failures, 1);
    }

    #[test]
    fn test_raw_formats_cover_defaults() {
        let formats = raw_formats();
        assert_eq!(formats.len(), defaults::RAW_FORMATS.len());
        assert!(formats.contains(&StructureFormat::Mol2));
    }

    #[test]
    fn test_summary_clean() {
        let mut summary = RunSummary::default();
        assert!(summary.clean());
        summary.packing_failures = 1;
        assert!(!summary.clean());
    }
}
