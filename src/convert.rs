//! Format conversion via the external converter
//!
//! Wraps one converter invocation per file: `obabel "<in>" -O "<out>"`.
//! On success the consumed source is renamed into an archival directory so
//! a later pass over the same glob never picks it up twice. On a nonzero
//! exit the diagnostic stream is logged, the archival move is skipped, and
//! the batch moves on to the next file. A spawn failure (converter binary
//! missing) is configuration-level and aborts the batch.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::process::{ExternalProcess, Invocation, ProcessError};
use crate::structure::{FileStage, StructureFile, StructureFormat};

/// Per-item conversion errors; isolated, never abort the batch.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("converter exited with code {exit_code} for '{input}': {diagnostics}")]
    ToolFailed {
        input: String,
        exit_code: i32,
        diagnostics: String,
    },

    #[error("converter reported success but produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("failed to archive '{input}' into {archive}: {source}")]
    Archive {
        input: String,
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one conversion batch.
#[derive(Debug, Default)]
pub struct ConversionBatch {
    /// Successfully converted files, now in the target format.
    pub converted: Vec<StructureFile>,
    /// Inputs already in the target format, left untouched.
    pub skipped: Vec<StructureFile>,
    /// Per-item failures, by input filename.
    pub failures: Vec<(String, ConversionError)>,
}

/// Invokes the external converter and manages consume-on-success archival.
pub struct FormatConverter<'a> {
    tool: &'a str,
    process: &'a dyn ExternalProcess,
}

impl<'a> FormatConverter<'a> {
    pub fn new(tool: &'a str, process: &'a dyn ExternalProcess) -> Self {
        Self { tool, process }
    }

    /// Convert one file to the target format and archive the source.
    ///
    /// The converted file lands next to the source under the same base
    /// name. Sources already in the target format are not touched.
    pub fn convert(
        &self,
        input: &StructureFile,
        target: StructureFormat,
        archive_dir: &Path,
    ) -> Result<Result<StructureFile, ConversionError>, ProcessError> {
        let output_path = input.path.with_extension(target.extension());

        let invocation = Invocation::new(
            self.tool,
            &[
                &input.path.display().to_string(),
                "-O",
                &output_path.display().to_string(),
            ],
        );
        let output = self.process.run(&invocation)?;

        if !output.success() {
            return Ok(Err(ConversionError::ToolFailed {
                input: input.file_name(),
                exit_code: output.exit_code,
                diagnostics: output.stderr.trim().to_string(),
            }));
        }

        if !output_path.exists() {
            return Ok(Err(ConversionError::MissingOutput(output_path)));
        }

        if let Err(err) = archive_file(&input.path, archive_dir) {
            return Ok(Err(ConversionError::Archive {
                input: input.file_name(),
                archive: archive_dir.to_path_buf(),
                source: err,
            }));
        }

        Ok(Ok(StructureFile {
            base_name: input.base_name.clone(),
            format: target,
            path: output_path,
            stage: FileStage::Normalized,
        }))
    }

    /// Convert a batch of files, isolating per-item failures.
    pub fn convert_batch(
        &self,
        inputs: &[StructureFile],
        target: StructureFormat,
        archive_dir: &Path,
    ) -> Result<ConversionBatch, ProcessError> {
        let mut batch = ConversionBatch::default();

        for input in inputs {
            if input.format == target {
                // Already normalized; conversion and archival both skipped.
                batch.skipped.push(input.clone());
                continue;
            }

            match self.convert(input, target, archive_dir)? {
                Ok(converted) => {
                    info!(input = %input.file_name(), output = %converted.file_name(), "converted");
                    batch.converted.push(converted);
                }
                Err(err) => {
                    warn!(input = %input.file_name(), error = %err, "conversion failed, skipping");
                    batch.failures.push((input.file_name(), err));
                }
            }
        }

        Ok(batch)
    }
}

/// Destructive rename into the archive directory, created on demand.
/// Renaming over an already-archived copy of the same name is not an error.
pub fn archive_file(path: &Path, archive_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(archive_dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"))?;
    std::fs::rename(path, archive_dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockOutcome, MockProcess};
    use crate::structure::{list_structures, FileStage};
    use std::fs;

    fn raw(dir: &Path, name: &str, format: StructureFormat) -> StructureFile {
        let path = dir.join(format!("{name}.{}", format.extension()));
        fs::write(&path, b"x").unwrap();
        StructureFile {
            base_name: name.to_string(),
            format,
            path,
            stage: FileStage::Raw,
        }
    }

    #[test]
    fn test_successful_conversion_archives_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = raw(dir.path(), "water", StructureFormat::Mol);
        let archive = dir.path().join("originals");

        let mock = MockProcess::new();
        mock.script(
            "obabel",
            MockOutcome::success().creating(dir.path().join("water.pdb")),
        );

        let converter = FormatConverter::new("obabel", &mock);
        let converted = converter
            .convert(&input, StructureFormat::Pdb, &archive)
            .unwrap()
            .unwrap();

        assert_eq!(converted.file_name(), "water.pdb");
        assert_eq!(converted.stage, FileStage::Normalized);
        assert!(dir.path().join("water.pdb").exists());
        // Source was renamed, not copied.
        assert!(!dir.path().join("water.mol").exists());
        assert!(archive.join("water.mol").exists());

        let args = &mock.invocations_of("obabel")[0].args;
        assert_eq!(args[1], "-O");
    }

    #[test]
    fn test_failed_conversion_leaves_source_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let input = raw(dir.path(), "broken", StructureFormat::Cif);
        let archive = dir.path().join("originals");

        let mock = MockProcess::new();
        mock.script("obabel", MockOutcome::failure(1, "could not parse CIF block"));

        let converter = FormatConverter::new("obabel", &mock);
        let result = converter
            .convert(&input, StructureFormat::Pdb, &archive)
            .unwrap();

        match result {
            Err(ConversionError::ToolFailed { diagnostics, .. }) => {
                assert_eq!(diagnostics, "could not parse CIF block");
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
        // Failed input stays visible for manual inspection.
        assert!(dir.path().join("broken.cif").exists());
        assert!(!archive.exists());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("originals");
        let inputs = vec![
            raw(dir.path(), "bad", StructureFormat::Mol),
            raw(dir.path(), "good", StructureFormat::Xyz),
        ];

        let mock = MockProcess::new();
        // First invocation fails, second succeeds and declares its output.
        mock.script(
            "obabel",
            MockOutcome::failure(1, "bad input").with_fail_count(1),
        );
        fs::write(dir.path().join("good.pdb"), b"").unwrap();

        let converter = FormatConverter::new("obabel", &mock);
        let batch = converter
            .convert_batch(&inputs, StructureFormat::Pdb, &archive)
            .unwrap();

        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0, "bad.mol");
        assert_eq!(batch.converted.len(), 1);
        assert_eq!(batch.converted[0].base_name, "good");
    }

    #[test]
    fn test_batch_skips_already_normalized_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![raw(dir.path(), "ready", StructureFormat::Pdb)];

        let mock = MockProcess::new();
        let converter = FormatConverter::new("obabel", &mock);
        let batch = converter
            .convert_batch(&inputs, StructureFormat::Pdb, dir.path())
            .unwrap();

        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(mock.call_count("obabel"), 0);
        assert!(dir.path().join("ready.pdb").exists());
    }

    #[test]
    fn test_archived_file_not_rediscovered() {
        let dir = tempfile::tempdir().unwrap();
        let input = raw(dir.path(), "water", StructureFormat::Mol);
        let archive = dir.path().join("originals");

        let mock = MockProcess::new();
        mock.script(
            "obabel",
            MockOutcome::success().creating(dir.path().join("water.pdb")),
        );

        let converter = FormatConverter::new("obabel", &mock);
        converter
            .convert(&input, StructureFormat::Pdb, &archive)
            .unwrap()
            .unwrap();

        let left = list_structures(dir.path(), &[StructureFormat::Mol], FileStage::Raw).unwrap();
        assert!(left.is_empty());
    }

    #[test]
    fn test_rearchiving_same_name_does_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("originals");
        fs::create_dir_all(&archive).unwrap();
        fs::write(archive.join("water.mol"), b"old").unwrap();

        let path = dir.path().join("water.mol");
        fs::write(&path, b"new").unwrap();

        archive_file(&path, &archive).unwrap();
        assert_eq!(fs::read(archive.join("water.mol")).unwrap(), b"new");
    }
}
