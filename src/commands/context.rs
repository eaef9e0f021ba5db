//! Command: print the machine context.
use anyhow::{Context as _, Result};

use crate::cli::{ContextOpts, GlobalOpts};
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::platform::Platform;

/// Print the machine context as JSON. Environment variables are omitted
/// unless `--env` is given.
///
/// # Errors
///
/// Returns an error if the context cannot be serialized or written.
pub fn run(global: &GlobalOpts, opts: &ContextOpts, log: &Logger) -> Result<()> {
    let platform = Platform::detect();
    let mut ctx = super::machine_context(global, &platform, &SystemExecutor);
    log.debug(&format!(
        "{} environment variables captured",
        ctx.environment.len()
    ));
    if !opts.env {
        ctx.environment.clear();
    }
    let json = serde_json::to_string_pretty(&ctx).context("serializing machine context")?;
    super::emit(&json)
}
