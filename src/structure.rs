//! Structure file registry
//!
//! Pure discovery of molecular structure files: which files of which
//! formats sit at the top level of a directory. Ordering is lexicographic
//! on the full filename so that downstream pair generation is reproducible
//! across runs for the same input set. Never mutates filesystem state and
//! never recurses.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;

/// Structural file formats the pipeline knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureFormat {
    Pdb,
    Xyz,
    Mol,
    Mol2,
    Cif,
    Sdf,
    Vasp,
}

impl StructureFormat {
    /// Filename extension for this format, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            StructureFormat::Pdb => "pdb",
            StructureFormat::Xyz => "xyz",
            StructureFormat::Mol => "mol",
            StructureFormat::Mol2 => "mol2",
            StructureFormat::Cif => "cif",
            StructureFormat::Sdf => "sdf",
            StructureFormat::Vasp => "vasp",
        }
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for StructureFormat {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdb" => Ok(StructureFormat::Pdb),
            "xyz" => Ok(StructureFormat::Xyz),
            "mol" => Ok(StructureFormat::Mol),
            "mol2" => Ok(StructureFormat::Mol2),
            "cif" => Ok(StructureFormat::Cif),
            "sdf" => Ok(StructureFormat::Sdf),
            "vasp" => Ok(StructureFormat::Vasp),
            other => Err(RegistryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Where a structure file sits in the pipeline lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    /// As dropped into the working directory.
    Raw,
    /// Converted to the common format.
    Normalized,
    /// Consumed and relocated into an archival directory.
    Archived,
}

/// A discovered structure file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureFile {
    /// Filename without the format extension; the stable identity key
    /// across all pipeline stages.
    pub base_name: String,
    /// Format tag.
    pub format: StructureFormat,
    /// Filesystem location.
    pub path: PathBuf,
    /// Lifecycle stage.
    pub stage: FileStage,
}

impl StructureFile {
    /// Filename including the extension.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.base_name, self.format.extension())
    }
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown structure format: {0}")]
    UnknownFormat(String),

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid format glob: {0}")]
    Glob(#[from] globset::Error),
}

fn format_globs(formats: &[StructureFormat]) -> Result<GlobSet, RegistryError> {
    let mut builder = GlobSetBuilder::new();
    for format in formats {
        builder.add(Glob::new(&format!("*.{}", format.extension()))?);
    }
    Ok(builder.build()?)
}

fn format_of(file_name: &str, formats: &[StructureFormat]) -> Option<StructureFormat> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    formats.iter().copied().find(|f| f.extension() == ext)
}

/// List structure files of the given formats at the top level of `dir`,
/// sorted lexicographically by filename.
pub fn list_structures(
    dir: &Path,
    formats: &[StructureFormat],
    stage: FileStage,
) -> Result<Vec<StructureFile>, RegistryError> {
    let globs = format_globs(formats)?;

    let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RegistryError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !globs.is_match(file_name) {
            continue;
        }
        let Some(format) = format_of(file_name, formats) else {
            continue;
        };
        let base_name = file_name
            .strip_suffix(&format!(".{}", format.extension()))
            .unwrap_or(file_name)
            .to_string();
        files.push(StructureFile {
            base_name,
            format,
            path,
            stage,
        });
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
