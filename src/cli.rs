//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ValidationLevel;

/// Machine-aware configuration backup and restore.
#[derive(Parser, Debug)]
#[command(
    name = "recovery",
    about = "Resolve machine-aware configuration templates for backup and restore",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Resolve as if running on this host name
    #[arg(long, global = true)]
    pub hostname: Option<String>,

    /// Resolve as if running on this machine name
    #[arg(long, global = true)]
    pub machine_name: Option<String>,

    /// Override the validation level from the inheritance file
    #[arg(long, global = true, value_enum)]
    pub validation_level: Option<ValidationLevel>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a template (or every template in a directory) for this machine
    Resolve(ResolveOpts),
    /// Load a template and report schema and validation findings
    Validate(ValidateOpts),
    /// Print the detected machine context as JSON
    Context(ContextOpts),
    /// Print a template's privilege requirements
    Privileges(PrivilegesOpts),
    /// Run a template's prerequisite probes
    Prerequisites(TemplateOpts),
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Resolve(_) => "resolve",
            Self::Validate(_) => "validate",
            Self::Context(_) => "context",
            Self::Privileges(_) => "privileges",
            Self::Prerequisites(_) => "prerequisites",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Options for the `resolve` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ResolveOpts {
    /// Template file, or a directory of templates
    pub path: PathBuf,

    /// Inheritance file with machine configurations, rules, and sections
    #[arg(short, long)]
    pub inheritance: Option<PathBuf>,

    /// Write the JSON result to this file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Options for the `validate` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ValidateOpts {
    /// Template file
    pub template: PathBuf,

    /// Inheritance file to validate against
    #[arg(short, long)]
    pub inheritance: Option<PathBuf>,
}

/// Options for the `context` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ContextOpts {
    /// Include environment variables in the output
    #[arg(long)]
    pub env: bool,
}

/// Options for the `privileges` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct PrivilegesOpts {
    /// Template file
    pub template: PathBuf,

    /// Report whether elevation would be requested, without requesting it
    #[arg(long)]
    pub what_if: bool,
}

/// A single template argument.
#[derive(Parser, Debug, Clone)]
pub struct TemplateOpts {
    /// Template file
    pub template: PathBuf,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
