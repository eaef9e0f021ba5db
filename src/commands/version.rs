//! Command: print version information.
use anyhow::Result;

/// Build version: `RECOVERY_VERSION` from the build script, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("RECOVERY_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the version to stdout.
///
/// # Errors
///
/// Returns an error if stdout is closed.
pub fn run() -> Result<()> {
    super::emit(&format!("recovery {}", version()))
}
