//! crestprep CLI
//!
//! Entry point for the `crestprep` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use crestprep::pipeline::Pipeline;
use crestprep::process::SystemProcess;
use crestprep::{ConfigError, PipelineConfig, PipelineError};

#[derive(Parser)]
#[command(name = "crestprep")]
#[command(about = "Pack molecular dimers and stage CREST conformer searches on SLURM", version)]
struct Cli {
    /// Path to a TOML config file; built-in defaults are used without one
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Working directory containing the structure files
    #[arg(long, short = 'd', global = true, default_value = ".")]
    working_dir: PathBuf,

    /// Increase log verbosity (-v, -vv)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full workflow: normalize, pack, convert, stage, submit
    Run,

    /// List the planned pair jobs without invoking any external tool
    Plan,

    /// Convert raw structure files to PDB and archive the originals
    Normalize,

    /// Run the packing tool for every unique molecular pair
    Pack,

    /// Convert packed PDB structures to XYZ
    Convert,

    /// Create staged job directories with submission scripts
    Stage,

    /// Submit every staged job directory to the scheduler
    Submit,
}

fn main() {
    let cli = Cli::parse();
    crestprep::logging::setup_logging(cli.verbose, cli.quiet);

    let config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(config_exit_code(&e));
        }
    };

    let system = SystemProcess::new();
    let pipeline = Pipeline::new(&config, &system, &cli.working_dir);

    let result = match cli.command {
        Commands::Run => run_full(&pipeline),
        Commands::Plan => run_plan(&pipeline),
        Commands::Normalize => pipeline.normalize().map(|batch| {
            println!(
                "normalized {} structures ({} already normalized, {} failed)",
                batch.converted.len(),
                batch.skipped.len(),
                batch.failures.len()
            );
        }),
        Commands::Pack => pipeline.pack().map(|batch| {
            println!(
                "packed {} configurations ({} failed)",
                batch.packed.len(),
                batch.failures.len()
            );
        }),
        Commands::Convert => pipeline.convert_packed().map(|batch| {
            println!(
                "converted {} structures ({} failed)",
                batch.converted.len(),
                batch.failures.len()
            );
        }),
        Commands::Stage => pipeline.stage().map(|batch| {
            println!(
                "staged {} jobs ({} failed)",
                batch.outcomes.len(),
                batch.failures.len()
            );
        }),
        Commands::Submit => pipeline.submit().map(|outcomes| {
            println!("submission attempted for {} staged jobs", outcomes.len());
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run_full(pipeline: &Pipeline) -> Result<(), PipelineError> {
    let summary = pipeline.run()?;
    println!("{}", summary);
    Ok(())
}

fn run_plan(pipeline: &Pipeline) -> Result<(), PipelineError> {
    let jobs = pipeline.plan()?;
    if jobs.is_empty() {
        println!("No normalized structures found; nothing to pack.");
        return Ok(());
    }
    println!("Planned packing jobs ({} total):\n", jobs.len());
    for job in &jobs {
        println!(
            "  {} (tolerance {}, members {} + {})",
            job.name, job.tolerance, job.members[0], job.members[1]
        );
    }
    Ok(())
}

fn config_exit_code(_e: &ConfigError) -> i32 {
    1
}
