//! Built-in pipeline defaults
//!
//! The inherited operational values for the cluster this pipeline grew up
//! on. Every value can be overridden from the TOML config file.

/// External converter binary (Open Babel).
pub const CONVERTER: &str = "obabel";

/// External packing binary.
pub const PACKING_TOOL: &str = "packmol";

/// Conformer-search binary invoked from the submission script.
pub const CONFORMER_TOOL: &str = "crest";

/// Scheduler submission command.
pub const SCHEDULER: &str = "sbatch";

/// Fixed option string appended to the conformer-tool invocation.
pub const CONFORMER_OPTIONS: &str = "--noreftopo --nci --T 16";

/// PACKMOL tolerance for a structure paired with itself.
pub const TOLERANCE_SELF: f64 = 2.0;

/// PACKMOL tolerance for two distinct structures. Strictly looser than the
/// self-pair value: distinct molecules need more clearance to avoid atomic
/// overlap during packing.
pub const TOLERANCE_CROSS: f64 = 2.1;

/// Edge length of the cubic packing box, in angstroms.
pub const BOX_EDGE: f64 = 40.0;

/// SLURM node count.
pub const SLURM_NODES: u32 = 1;

/// SLURM tasks per node.
pub const SLURM_TASKS_PER_NODE: u32 = 16;

/// SLURM memory per CPU.
pub const SLURM_MEM_PER_CPU: &str = "7G";

/// SLURM wall-clock limit.
pub const SLURM_TIME: &str = "500:00:00";

/// Archival directory for raw inputs consumed by normalization.
pub const ORIGINALS_DIR: &str = "originals";

/// Archival directory for member PDBs consumed by packing.
pub const PACKED_ARCHIVE_DIR: &str = "original_pdb_files";

/// Archival directory for packed PDBs consumed by xyz conversion.
pub const XYZ_ARCHIVE_DIR: &str = "xyz_files";

/// Staging root: one subdirectory per packed structure.
pub const STAGING_DIR: &str = "crest_calculations";

/// Raw structure formats picked up by normalization, in discovery order.
pub const RAW_FORMATS: &[&str] = &["vasp", "sdf", "pdb", "mol", "mol2", "cif", "xyz"];
