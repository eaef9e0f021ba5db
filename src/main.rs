//! `recovery` command-line entry point.
use anyhow::Result;
use clap::Parser;

use recovery_cli::cli::{Cli, Command};
use recovery_cli::commands;
use recovery_cli::logging::{Logger, init_subscriber};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();
    init_subscriber(args.verbose, name);
    let log = Logger::new(name);

    match &args.command {
        Command::Resolve(opts) => commands::resolve::run(&args.global, opts, &log),
        Command::Validate(opts) => commands::validate::run(&args.global, opts, &log),
        Command::Context(opts) => commands::context::run(&args.global, opts, &log),
        Command::Privileges(opts) => commands::privileges::run(opts, &log),
        Command::Prerequisites(opts) => commands::prerequisites::run(opts, &log),
        Command::Completions(opts) => {
            commands::completions::run(opts);
            Ok(())
        }
        Command::Version => commands::version::run(),
    }
}
