//! Template prerequisite probes.
use crate::config::{ComparisonOperator, OnMissing, Prerequisite, PrerequisiteKind, Template};
use crate::engine::selector::compare;
use crate::error::PrerequisiteError;
use crate::exec::Executor;
use crate::platform::Platform;
use crate::store::{StateStore, StorePath};

/// Overall result of a template's prerequisite checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrerequisiteOutcome {
    /// Every probe passed.
    Satisfied,
    /// Some `warn` probes failed; names in declaration order.
    Warned(Vec<String>),
    /// A `skip` probe failed; the template should not be acted on.
    SkipTemplate(String),
}

/// Result of running one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Probe {
    satisfied: bool,
    expected: String,
    actual: String,
}

fn run_script(
    prerequisite: &Prerequisite,
    executor: &dyn Executor,
    platform: &Platform,
) -> Result<Probe, PrerequisiteError> {
    let (shell, shell_args) = platform.script_shell(executor);
    let mut args: Vec<&str> = shell_args.to_vec();
    args.push(&prerequisite.check);
    let result = executor
        .run_unchecked(shell, &args)
        .map_err(|e| PrerequisiteError::Probe {
            name: prerequisite.name.clone(),
            source: e.into(),
        })?;
    let output = result.stdout.trim().to_string();

    match &prerequisite.expected_output {
        Some(pattern) => {
            let satisfied = compare(&output, pattern, ComparisonOperator::Matches).map_err(
                |source| PrerequisiteError::Comparison {
                    name: prerequisite.name.clone(),
                    source,
                },
            )?;
            Ok(Probe {
                satisfied,
                expected: format!("output matching '{pattern}'"),
                actual: format!("'{output}'"),
            })
        }
        None => Ok(Probe {
            satisfied: result.success,
            expected: "exit code 0".to_string(),
            actual: result
                .code
                .map_or_else(|| "no exit code".to_string(), |c| format!("exit code {c}")),
        }),
    }
}

fn probe_exists(store: &dyn StateStore, path: &StorePath) -> Probe {
    let satisfied = store.exists(path);
    Probe {
        satisfied,
        expected: format!("{path} to exist"),
        actual: if satisfied { "present" } else { "missing" }.to_string(),
    }
}

fn run_probe(
    prerequisite: &Prerequisite,
    executor: &dyn Executor,
    store: &dyn StateStore,
    platform: &Platform,
) -> Result<Probe, PrerequisiteError> {
    match prerequisite.kind {
        PrerequisiteKind::Script => run_script(prerequisite, executor, platform),
        PrerequisiteKind::Registry => Ok(probe_exists(store, &StorePath::parse(&prerequisite.check))),
        PrerequisiteKind::File => Ok(probe_exists(store, &StorePath::file(&prerequisite.check))),
    }
}

/// Evaluate `template`'s prerequisites in declaration order.
///
/// A failed `skip` probe stops evaluation; a failed `warn` probe is logged
/// and recorded.
///
/// # Errors
///
/// Returns [`PrerequisiteError::Failed`] for a failed `fail` probe,
/// [`PrerequisiteError::Probe`] if a script cannot be spawned, or
/// [`PrerequisiteError::Comparison`] for an invalid `expected_output`.
pub fn check_prerequisites(
    template: &Template,
    executor: &dyn Executor,
    store: &dyn StateStore,
    platform: &Platform,
) -> Result<PrerequisiteOutcome, PrerequisiteError> {
    let mut warned = Vec::new();
    for prerequisite in &template.prerequisites {
        let probe = run_probe(prerequisite, executor, store, platform)?;
        if probe.satisfied {
            tracing::debug!("prerequisite '{}' satisfied", prerequisite.name);
            continue;
        }
        match prerequisite.on_missing {
            OnMissing::Fail => {
                return Err(PrerequisiteError::Failed {
                    name: prerequisite.name.clone(),
                    expected: probe.expected,
                    actual: probe.actual,
                });
            }
            OnMissing::Skip => {
                tracing::info!(
                    "skipping template '{}': prerequisite '{}' not met",
                    template.metadata.name,
                    prerequisite.name
                );
                return Ok(PrerequisiteOutcome::SkipTemplate(prerequisite.name.clone()));
            }
            OnMissing::Warn => {
                tracing::warn!(
                    "prerequisite '{}' not met: expected {}, got {}",
                    prerequisite.name,
                    probe.expected,
                    probe.actual
                );
                warned.push(prerequisite.name.clone());
            }
        }
    }
    Ok(if warned.is_empty() {
        PrerequisiteOutcome::Satisfied
    } else {
        PrerequisiteOutcome::Warned(warned)
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::{ExecResult, MockExecutor};
    use crate::platform::Os;
    use crate::store::{EntryKind, MemoryRegistry};
    use serde_json::json;

    fn linux() -> Platform {
        Platform::new(Os::Linux, "")
    }

    fn template(prerequisites: serde_json::Value) -> Template {
        serde_json::from_value(json!({
            "metadata": { "name": "app" },
            "prerequisites": prerequisites
        }))
        .unwrap()
    }

    fn shell_executor(stdout: &'static str, success: bool) -> MockExecutor {
        let mut exec = MockExecutor::new();
        exec.expect_which().returning(|_| false);
        exec.expect_run_unchecked()
            .withf(|program, args| program == "sh" && args.first() == Some(&"-c"))
            .returning(move |_, _| {
                Ok(if success {
                    ExecResult::ok(stdout)
                } else {
                    ExecResult::failed(1)
                })
            });
        exec
    }

    #[test]
    fn no_prerequisites_is_satisfied() {
        let outcome = check_prerequisites(
            &template(json!([])),
            &MockExecutor::new(),
            &MemoryRegistry::new(),
            &linux(),
        )
        .unwrap();
        assert_eq!(outcome, PrerequisiteOutcome::Satisfied);
    }

    #[test]
    fn script_output_matches_expected_pattern() {
        let t = template(json!([{
            "type": "script", "name": "git", "check": "git --version",
            "expected_output": "^git version 2\\.", "on_missing": "fail"
        }]));
        let exec = shell_executor("git version 2.43.0\n", true);
        let outcome = check_prerequisites(&t, &exec, &MemoryRegistry::new(), &linux()).unwrap();
        assert_eq!(outcome, PrerequisiteOutcome::Satisfied);
    }

    #[test]
    fn script_mismatch_with_fail_is_error() {
        let t = template(json!([{
            "type": "script", "name": "git", "check": "git --version",
            "expected_output": "^git version 3", "on_missing": "fail"
        }]));
        let exec = shell_executor("git version 2.43.0", true);
        let err = check_prerequisites(&t, &exec, &MemoryRegistry::new(), &linux()).unwrap_err();
        assert!(matches!(
            &err,
            PrerequisiteError::Failed { name, actual, .. } if name == "git" && actual == "'git version 2.43.0'"
        ));
    }

    #[test]
    fn script_exit_code_without_pattern() {
        let t = template(json!([{ "name": "probe", "check": "false" }]));
        let exec = shell_executor("", false);
        let outcome = check_prerequisites(&t, &exec, &MemoryRegistry::new(), &linux()).unwrap();
        assert_eq!(outcome, PrerequisiteOutcome::Warned(vec!["probe".to_string()]));
    }

    #[test]
    fn invalid_pattern_is_comparison_error() {
        let t = template(json!([{ "name": "p", "check": "echo", "expected_output": "(" }]));
        let exec = shell_executor("x", true);
        let err = check_prerequisites(&t, &exec, &MemoryRegistry::new(), &linux()).unwrap_err();
        assert!(matches!(err, PrerequisiteError::Comparison { .. }));
    }

    #[test]
    fn spawn_failure_is_probe_error() {
        let t = template(json!([{ "name": "p", "check": "echo" }]));
        let mut exec = MockExecutor::new();
        exec.expect_which().returning(|_| false);
        exec.expect_run_unchecked()
            .returning(|_, _| Err(anyhow::anyhow!("no shell")));
        let err = check_prerequisites(&t, &exec, &MemoryRegistry::new(), &linux()).unwrap_err();
        assert!(matches!(err, PrerequisiteError::Probe { .. }));
    }

    #[test]
    fn registry_probe_uses_store() {
        let registry = MemoryRegistry::new();
        registry
            .create(&StorePath::parse(r"HKCU:\Software\App"), EntryKind::Key)
            .unwrap();
        let t = template(json!([
            { "type": "registry", "name": "present", "check": "HKCU:\\Software\\App", "on_missing": "fail" },
            { "type": "registry", "name": "absent", "check": "HKCU:\\Software\\Missing", "on_missing": "skip" },
            { "type": "registry", "name": "unreached", "check": "HKCU:\\Nope", "on_missing": "fail" }
        ]));
        let outcome = check_prerequisites(&t, &MockExecutor::new(), &registry, &linux()).unwrap();
        assert_eq!(outcome, PrerequisiteOutcome::SkipTemplate("absent".to_string()));
    }

    #[test]
    fn file_probe_checks_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("app.conf");
        std::fs::write(&present, "x").unwrap();
        let store = crate::store::FileStore;
        let t = template(json!([
            { "type": "file", "name": "conf", "check": present.to_string_lossy(), "on_missing": "fail" },
            { "type": "file", "name": "cache", "check": dir.path().join("cache").to_string_lossy() }
        ]));
        let outcome = check_prerequisites(&t, &MockExecutor::new(), &store, &linux()).unwrap();
        assert_eq!(outcome, PrerequisiteOutcome::Warned(vec!["cache".to_string()]));
    }
}
