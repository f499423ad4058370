//! Suitesync binary entrypoint.

use clap::Parser;

use suitesync::config::SyncConfig;
use suitesync::logging;
use suitesync::tooling::cli::{Cli, CliContext};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.debug)?;

    let config = SyncConfig::load(cli.config.as_deref())?;
    let context = CliContext::new(config);

    let output = context.execute(&cli.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
