//! Top-level subcommand implementations.
//!
//! Each command builds its components from a [`Context`], reports progress
//! through the logger and prints its result on stdout.
pub mod completions;
pub mod fetch;
pub mod install;
pub mod inventory;
pub mod mount;
pub mod package;
pub mod version;

use std::borrow::Cow;
use std::path::Path;

use anyhow::Result;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::Context;

/// Print a command result on stdout, ending it with a newline.
///
/// Empty text prints nothing.
#[allow(clippy::print_stdout)]
pub fn emit(text: &str) {
    print!("{}", line_terminated(text));
}

fn line_terminated(text: &str) -> Cow<'_, str> {
    if text.is_empty() || text.ends_with('\n') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{text}\n"))
    }
}

/// Load the configuration selected by `--config` and build a system context.
///
/// # Errors
///
/// Returns an error if the configuration file exists but cannot be parsed.
pub fn load_context(config_path: Option<&Path>) -> Result<Context> {
    let path = Config::resolve_path(config_path);
    let config = Config::load(&path)?;
    let ctx = Context::new(config);
    if path.exists() {
        ctx.log.debug(&format!("config: {}", path.display()));
    }
    Ok(ctx)
}

/// Dispatch a parsed command line.
///
/// # Errors
///
/// Returns the first error raised by the selected command.
pub fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Completions(opts) => {
            completions::run(opts);
            return Ok(());
        }
        Command::Version => {
            version::run();
            return Ok(());
        }
        _ => {}
    }

    let ctx = load_context(cli.config.as_deref())?;
    match &cli.command {
        Command::Install(opts) => install::run(&ctx, opts),
        Command::Fetch(opts) => fetch::run(&ctx, opts),
        Command::Mount(opts) => mount::run_mount(&ctx, opts),
        Command::Eject(opts) => mount::run_eject(&ctx, opts),
        Command::Unmount(opts) => mount::run_unmount(&ctx, opts),
        Command::Pkg(opts) => package::run_pkg(&ctx, opts),
        Command::Profile(opts) => package::run_profile(&ctx, opts),
        Command::Inventory(sub) => inventory::run(&ctx, sub),
        Command::HostKind => inventory::run_host_kind(&ctx),
        Command::Completions(_) | Command::Version => Ok(()),
    }
}
