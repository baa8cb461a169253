//! Command: generate shell completions.
use std::io::Write;

use clap::CommandFactory;

use crate::cli::{Cli, CompletionsOpts};

/// Write the completion script for `opts.shell` to `out`.
pub fn generate(opts: &CompletionsOpts, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    clap_complete::generate(opts.shell, &mut cmd, "macprov", out);
}

/// Print the completion script to stdout.
pub fn run(opts: &CompletionsOpts) {
    generate(opts, &mut std::io::stdout().lock());
}
