//! Logging System
//!
//! Structured logging via `tracing`. The filter comes from the SUITESYNC_LOG
//! environment variable when set, otherwise from the CLI verbosity flags.
//! Output goes to stderr so rendered trees and diff listings stay clean on
//! stdout.

use tracing_subscriber::EnvFilter;

use crate::error::SyncError;

fn default_level(verbose: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Install the global subscriber. Call once, before any command runs.
pub fn init(verbose: bool, debug: bool) -> Result<(), SyncError> {
    let filter = match EnvFilter::try_from_env("SUITESYNC_LOG") {
        Ok(filter) => filter,
        Err(_) => {
            EnvFilter::try_new(format!("suitesync={}", default_level(verbose, debug)))
                .map_err(|err| SyncError::Config(format!("invalid log filter: {err}")))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
    Ok(())
}
