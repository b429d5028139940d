//! Tracing setup.
//!
//! Logs go to stderr so they interleave cleanly with the session output the
//! drain writes to stdout.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool, quiet: bool) {
    let level = if quiet {
        LevelFilter::OFF
    } else if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
