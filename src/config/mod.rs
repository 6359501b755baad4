//! Pipeline configuration
//!
//! All tool paths, tolerances, resource parameters and directory names live
//! in one explicit [`PipelineConfig`] value passed into each component at
//! construction. Built-in defaults sit under an optional TOML file; any
//! field the file omits keeps its default.

pub mod defaults;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External tool commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Format converter (Open Babel).
    pub converter: String,
    /// Molecular packing tool.
    pub packing: String,
    /// Conformer-search tool invoked by the submission script.
    pub conformer: String,
    /// Scheduler submission command.
    pub scheduler: String,
    /// Fixed option string for the conformer tool.
    pub conformer_options: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            converter: defaults::CONVERTER.to_string(),
            packing: defaults::PACKING_TOOL.to_string(),
            conformer: defaults::CONFORMER_TOOL.to_string(),
            scheduler: defaults::SCHEDULER.to_string(),
            conformer_options: defaults::CONFORMER_OPTIONS.to_string(),
        }
    }
}

/// Packing parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingConfig {
    /// Tolerance for self-pairs.
    pub tolerance_self: f64,
    /// Tolerance for cross-pairs.
    pub tolerance_cross: f64,
    /// Edge length of the cubic box shared by all jobs in a run.
    pub box_edge: f64,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            tolerance_self: defaults::TOLERANCE_SELF,
            tolerance_cross: defaults::TOLERANCE_CROSS,
            box_edge: defaults::BOX_EDGE,
        }
    }
}

/// SLURM resource directives baked into every submission script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurmConfig {
    pub nodes: u32,
    pub tasks_per_node: u32,
    pub mem_per_cpu: String,
    /// Wall-clock limit in SLURM time syntax.
    pub time: String,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            nodes: defaults::SLURM_NODES,
            tasks_per_node: defaults::SLURM_TASKS_PER_NODE,
            mem_per_cpu: defaults::SLURM_MEM_PER_CPU.to_string(),
            time: defaults::SLURM_TIME.to_string(),
        }
    }
}

/// Directory names, all created on demand relative to the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirsConfig {
    /// Archive for raw inputs consumed by normalization.
    pub originals: String,
    /// Archive for member PDBs consumed by packing.
    pub packed_archive: String,
    /// Archive for packed PDBs consumed by xyz conversion.
    pub xyz_archive: String,
    /// Staging root for per-job submission directories.
    pub staging: String,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            originals: defaults::ORIGINALS_DIR.to_string(),
            packed_archive: defaults::PACKED_ARCHIVE_DIR.to_string(),
            xyz_archive: defaults::XYZ_ARCHIVE_DIR.to_string(),
            staging: defaults::STAGING_DIR.to_string(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub tools: ToolsConfig,
    pub packing: PackingConfig,
    pub slurm: SlurmConfig,
    pub dirs: DirsConfig,
}

/// Configuration errors. These are fatal for the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl PipelineConfig {
    /// Load a config file, layering its values over the built-in defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional path, falling back to pure defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Reject values that would silently break downstream stages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packing.tolerance_cross <= self.packing.tolerance_self {
            return Err(ConfigError::Invalid(format!(
                "cross-pair tolerance ({}) must be strictly looser than self-pair tolerance ({})",
                self.packing.tolerance_cross, self.packing.tolerance_self
            )));
        }
        if self.packing.box_edge <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "box edge must be positive, got {}",
                self.packing.box_edge
            )));
        }
        if self.slurm.nodes == 0 || self.slurm.tasks_per_node == 0 {
            return Err(ConfigError::Invalid(
                "slurm nodes and tasks_per_node must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.tools.converter, "obabel");
        assert_eq!(config.tools.scheduler, "sbatch");
        assert_eq!(config.packing.tolerance_self, 2.0);
        assert_eq!(config.packing.tolerance_cross, 2.1);
        assert_eq!(config.packing.box_edge, 40.0);
        assert_eq!(config.dirs.staging, "crest_calculations");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_layers_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[packing]\nbox_edge = 25.0\n\n[tools]\npacking = \"/opt/packmol/packmol\"\n"
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();

        assert_eq!(config.packing.box_edge, 25.0);
        assert_eq!(config.tools.packing, "/opt/packmol/packmol");
        // Untouched fields keep their defaults.
        assert_eq!(config.packing.tolerance_self, 2.0);
        assert_eq!(config.slurm.mem_per_cpu, "7G");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = PipelineConfig::from_file(Path::new("/nonexistent/crestprep.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_rejects_inverted_tolerances() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[packing]\ntolerance_self = 2.5\ntolerance_cross = 2.1\n").unwrap();

        let result = PipelineConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = PipelineConfig::load(None).unwrap();
        assert_eq!(config.tools.conformer_options, "--noreftopo --nci --T 16");
    }
}
