//! Command: validate a template.
use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, ValidateOpts};
use crate::config::{ValidationLevel, load_template};
use crate::engine::resolve_with;
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::platform::Platform;

/// Load the template (schema checks), then resolve it for this machine so
/// pairing, registry-root and placeholder findings surface.
///
/// Without `--validation-level` the run is strict.
///
/// # Errors
///
/// Returns an error on the first schema or validation failure.
pub fn run(global: &GlobalOpts, opts: &ValidateOpts, log: &Logger) -> Result<()> {
    log.stage(&format!("Validating {}", opts.template.display()));
    let template = load_template(&opts.template)?;
    log.info(&format!(
        "schema ok: '{}' ({} backup, {} restore entries)",
        template.metadata.name,
        template.backup.len(),
        template.restore.len(),
    ));

    let inheritance = super::inheritance_or_default(opts.inheritance.as_deref())?;
    let ctx = super::machine_context(global, &Platform::detect(), &SystemExecutor);
    let level = global.validation_level.unwrap_or(ValidationLevel::Strict);
    let resolved = resolve_with(&template, &inheritance, &ctx, Some(level))
        .with_context(|| format!("validating {}", opts.template.display()))?;

    for warning in &resolved.warnings {
        log.warn(&warning.to_string());
    }
    log.info(&format!("valid at level {level}"));
    Ok(())
}
