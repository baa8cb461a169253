//! `macprov` command-line entry point.

use anyhow::Result;
use clap::Parser;

use macprov_cli::{cli, commands, interrupt, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    let log_path = logging::init_subscriber(args.verbose, args.command.name());
    if let Err(e) = interrupt::install_handler() {
        tracing::warn!("cannot install interrupt handler: {e}");
    }
    if let Some(path) = log_path {
        tracing::debug!("log file: {}", path.display());
    }

    commands::dispatch(&args)
}
