//! Command: generate shell completions.
use std::io;

use clap::CommandFactory as _;

use crate::cli::{Cli, CompletionsOpts};

/// Write completions for the requested shell to stdout.
pub fn run(opts: &CompletionsOpts) {
    let mut command = Cli::command();
    clap_complete::generate(opts.shell, &mut command, "recovery", &mut io::stdout());
}
