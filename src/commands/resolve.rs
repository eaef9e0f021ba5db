//! Command: resolve templates for this machine.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::cli::{GlobalOpts, ResolveOpts};
use crate::config::{InheritanceConfig, ValidationLevel, discover_templates, load_template};
use crate::context::MachineContext;
use crate::engine::{ResolvedConfiguration, resolve_with};
use crate::error::RecoveryError;
use crate::exec::SystemExecutor;
use crate::logging::{Logger, RunStatus};
use crate::platform::Platform;

/// One template's resolution, as printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    /// Template file.
    pub template: PathBuf,
    /// [`ResolvedConfiguration::fingerprint`].
    pub fingerprint: String,
    /// Validation warnings (moderate level).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// The resolved configuration.
    pub configuration: ResolvedConfiguration,
}

/// Load and resolve one template file.
///
/// # Errors
///
/// Returns [`RecoveryError::Template`] if the template cannot be loaded and
/// [`RecoveryError::Resolve`] if resolution fails.
pub fn resolve_file(
    path: &Path,
    inheritance: &InheritanceConfig,
    ctx: &MachineContext,
    level: Option<ValidationLevel>,
) -> Result<ResolveReport, RecoveryError> {
    let template = load_template(path)?;
    let configuration = resolve_with(&template, inheritance, ctx, level)?;
    let fingerprint = configuration.fingerprint()?;
    Ok(ResolveReport {
        template: path.to_path_buf(),
        fingerprint,
        warnings: configuration
            .warnings
            .iter()
            .map(ToString::to_string)
            .collect(),
        configuration,
    })
}

/// Resolve every path in parallel; results keep the input order.
#[must_use]
pub fn resolve_all(
    paths: &[PathBuf],
    inheritance: &InheritanceConfig,
    ctx: &MachineContext,
    level: Option<ValidationLevel>,
) -> Vec<(PathBuf, Result<ResolveReport, RecoveryError>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), resolve_file(path, inheritance, ctx, level)))
        .collect()
}

fn write_output(json: &str, out: Option<&Path>, log: &Logger) -> Result<()> {
    match out {
        Some(out) => {
            fs::write(out, format!("{json}\n"))
                .with_context(|| format!("writing {}", out.display()))?;
            log.info(&format!("wrote {}", out.display()));
            Ok(())
        }
        None => super::emit(json),
    }
}

/// Run the resolve command.
///
/// A single template prints one report; a directory prints an array of
/// the reports that succeeded and fails if any template failed.
///
/// # Errors
///
/// Returns an error if loading, resolution, or output fails.
pub fn run(global: &GlobalOpts, opts: &ResolveOpts, log: &Logger) -> Result<()> {
    let platform = Platform::detect();
    let inheritance = super::inheritance_or_default(opts.inheritance.as_deref())?;
    let ctx = super::machine_context(global, &platform, &SystemExecutor);
    log.info(&format!(
        "resolving for {} ({})",
        ctx.hostname, ctx.machine_name
    ));

    if !opts.path.is_dir() {
        log.stage(&format!("Resolving {}", opts.path.display()));
        let report = resolve_file(&opts.path, &inheritance, &ctx, global.validation_level)
            .with_context(|| format!("resolving {}", opts.path.display()))?;
        for warning in &report.warnings {
            log.warn(warning);
        }
        log.info(&format!("fingerprint: {}", report.fingerprint));
        let json = serde_json::to_string_pretty(&report).context("serializing result")?;
        return write_output(&json, opts.out.as_deref(), log);
    }

    let root = dunce::canonicalize(&opts.path).unwrap_or_else(|_| opts.path.clone());
    let paths = discover_templates(&root)?;
    log.stage(&format!(
        "Resolving {} templates in {}",
        paths.len(),
        root.display()
    ));
    let mut reports = Vec::new();
    for (path, result) in resolve_all(&paths, &inheritance, &ctx, global.validation_level) {
        let name = path.display().to_string();
        match result {
            Ok(report) => {
                let status = if report.warnings.is_empty() {
                    RunStatus::Ok
                } else {
                    RunStatus::Warned
                };
                let detail = (!report.warnings.is_empty())
                    .then(|| format!("{} warning(s)", report.warnings.len()));
                log.record(&name, status, detail.as_deref());
                log.debug(&format!("{name}: {}", report.fingerprint));
                reports.push(report);
            }
            Err(e) => {
                log.error(&format!("{name}: {e:#}"));
                log.record(&name, RunStatus::Failed, Some(&format!("{e:#}")));
            }
        }
    }

    let json = serde_json::to_string_pretty(&reports).context("serializing results")?;
    write_output(&json, opts.out.as_deref(), log)?;
    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} template(s) failed to resolve");
    }
    Ok(())
}
