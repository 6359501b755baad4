//! crestprep - CREST dimer-conformer batch pipeline
//!
//! This crate orchestrates a four-stage computational-chemistry pipeline:
//! normalize heterogeneous molecular structure files to PDB, pack every
//! unique self- and cross-pair of molecules with PACKMOL, convert the
//! packed configurations to XYZ, and stage one SLURM batch job per
//! configuration for a CREST conformer search.

pub mod config;
pub mod convert;
pub mod job;
pub mod logging;
pub mod mock;
pub mod packing;
pub mod pair;
pub mod pipeline;
pub mod process;
pub mod staging;
pub mod state;
pub mod structure;
pub mod submit;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use process::{ExternalProcess, Invocation, ProcessOutput, SystemProcess};
