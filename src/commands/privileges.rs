//! Command: report a template's privilege requirements.
use anyhow::{Context as _, Result};

use crate::cli::PrivilegesOpts;
use crate::config::load_template;
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::platform::Platform;
use crate::privilege::{ElevationOptions, ElevationOutcome, NeverElevate, PrivilegeModel};

/// Classify the template and print the requirements as JSON.
///
/// With `--what-if`, also report whether acting on the template would
/// request elevation. Nothing is ever prompted for.
///
/// # Errors
///
/// Returns an error if the template cannot be loaded.
pub fn run(opts: &PrivilegesOpts, log: &Logger) -> Result<()> {
    let template = load_template(&opts.template)?;
    let mut model = PrivilegeModel::detect(&Platform::detect(), &SystemExecutor);
    let requirements = model.classify(&template);
    for reason in &requirements.reasons {
        log.debug(reason);
    }
    if requirements.requires_elevation {
        log.warn(&format!(
            "'{}' needs an elevated session",
            template.metadata.name
        ));
    }

    if opts.what_if {
        let description = format!("restore '{}'", template.metadata.name);
        let options = ElevationOptions {
            what_if: true,
            no_prompt: true,
        };
        if let ElevationOutcome::DryRun(report) =
            model.with_elevation(&description, options, &NeverElevate, || Ok(()))?
        {
            log.dry_run(&report.to_string());
        }
    }

    let json = serde_json::to_string_pretty(&requirements).context("serializing requirements")?;
    super::emit(&json)
}
