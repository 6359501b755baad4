//! Logging setup
//!
//! Structured records go to stderr so the pipeline's own stdout stays
//! clean for summaries and dry-run listings.

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// Install the global subscriber. `verbosity` counts `-v` flags.
pub fn setup_logging(verbosity: u8, quiet: bool) {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .init();
}
