//! Command: run a template's prerequisite probes.
use anyhow::{Context as _, Result};

use crate::cli::TemplateOpts;
use crate::config::load_template;
use crate::exec::SystemExecutor;
use crate::logging::{Logger, RunStatus};
use crate::platform::Platform;
use crate::prerequisites::{PrerequisiteOutcome, check_prerequisites};
use crate::store::Store;

/// Log `outcome` and record it as the template's run entry.
fn record_outcome(log: &Logger, name: &str, outcome: &PrerequisiteOutcome) {
    match outcome {
        PrerequisiteOutcome::Satisfied => {
            log.info("all prerequisites satisfied");
            log.record(name, RunStatus::Ok, None);
        }
        PrerequisiteOutcome::Warned(names) => {
            let unmet = format!("unmet prerequisites: {}", names.join(", "));
            log.warn(&unmet);
            log.record(name, RunStatus::Warned, Some(&unmet));
        }
        PrerequisiteOutcome::SkipTemplate(prerequisite) => {
            let detail = format!("prerequisite '{prerequisite}' not met");
            log.info(&format!("template would be skipped: {detail}"));
            log.record(name, RunStatus::Skipped, Some(&detail));
        }
    }
}

/// Probe every prerequisite in order and report the outcome.
///
/// # Errors
///
/// Returns an error if the template cannot be loaded, a probe cannot run,
/// or a prerequisite marked `fail` is not met.
pub fn run(opts: &TemplateOpts, log: &Logger) -> Result<()> {
    let template = load_template(&opts.template)?;
    let name = template.metadata.name.as_str();
    log.stage(&format!(
        "Checking {} prerequisite(s) for '{name}'",
        template.prerequisites.len()
    ));
    let result = check_prerequisites(
        &template,
        &SystemExecutor,
        &Store::system(),
        &Platform::detect(),
    );

    match result {
        Ok(outcome) => {
            record_outcome(log, name, &outcome);
            log.print_summary();
            Ok(())
        }
        Err(e) => {
            log.record(name, RunStatus::Failed, Some(&e.to_string()));
            log.print_summary();
            Err(e).with_context(|| format!("checking prerequisites of {}", opts.template.display()))
        }
    }
}
