//! Subcommand handlers.
pub mod completions;
pub mod context;
pub mod prerequisites;
pub mod privileges;
pub mod resolve;
pub mod validate;
pub mod version;

use std::io::{self, Write as _};
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::{InheritanceConfig, load_inheritance};
use crate::context::MachineContext;
use crate::exec::Executor;
use crate::platform::Platform;
use crate::privilege::PrivilegeModel;

/// Snapshot this machine and apply `--hostname` / `--machine-name`
/// overrides. `session.elevated` comes from a privilege probe.
pub fn machine_context(
    global: &GlobalOpts,
    platform: &Platform,
    executor: &dyn Executor,
) -> MachineContext {
    let mut ctx = MachineContext::current()
        .with_elevated(PrivilegeModel::detect(platform, executor).is_elevated());
    if let Some(hostname) = &global.hostname {
        ctx = ctx.with_hostname(hostname);
    }
    if let Some(machine_name) = &global.machine_name {
        ctx = ctx.with_machine_name(machine_name);
    }
    ctx
}

/// Load an inheritance file, or the empty document when none is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn inheritance_or_default(path: Option<&Path>) -> Result<InheritanceConfig> {
    path.map_or_else(
        || Ok(InheritanceConfig::default()),
        |path| {
            load_inheritance(path)
                .with_context(|| format!("loading inheritance file {}", path.display()))
        },
    )
}

/// Write `text` plus a newline to stdout.
///
/// # Errors
///
/// Returns an error if stdout is closed.
pub fn emit(text: &str) -> Result<()> {
    writeln!(io::stdout().lock(), "{text}").context("writing to stdout")
}
