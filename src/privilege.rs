//! Privilege-aware execution.
//!
//! [`PrivilegeModel`] tracks whether the session is elevated and decides,
//! per operation, whether to run the main path, a degraded fallback, or fail.
//! It never prompts on its own: elevation requests go through a
//! caller-supplied [`ElevationStrategy`], and `no_prompt` guarantees a
//! non-interactive path.
use std::fmt;

use serde::Serialize;

use crate::config::Template;
use crate::error::{BoxError, PrivilegeError, StoreError};
use crate::exec::Executor;
use crate::platform::Platform;
use crate::store::RegistryPath;

/// Session privilege state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeState {
    /// Ordinary user session.
    Unprivileged,
    /// Administrator/root session.
    Elevated,
}

/// Whether an operation needs administrator rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    /// Runs in any session.
    User,
    /// Needs an elevated session.
    Admin,
}

/// Result of a privilege-dispatched operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome<T> {
    /// The main operation ran.
    Full(T),
    /// The fallback ran because the session lacked privileges.
    Degraded(T),
}

impl<T> AdminOutcome<T> {
    /// Whether the fallback ran.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// The operation's value, full or degraded.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(value) | Self::Degraded(value) => value,
        }
    }
}

/// A fallible operation handed to the privilege model.
pub type Operation<'a, T> = Box<dyn FnOnce() -> Result<T, BoxError> + 'a>;

/// Options for [`PrivilegeModel::with_elevation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElevationOptions {
    /// Report what would run and do nothing.
    pub what_if: bool,
    /// Never request elevation; fail instead.
    pub no_prompt: bool,
}

/// What a `what_if` run would have done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    /// Operation description.
    pub operation: String,
    /// Whether the session is already elevated.
    pub elevated: bool,
    /// Whether elevation would be requested first.
    pub would_request_elevation: bool,
}

impl fmt::Display for DryRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.would_request_elevation {
            write!(f, "would request elevation, then run: {}", self.operation)
        } else {
            write!(f, "would run: {}", self.operation)
        }
    }
}

/// Result of [`PrivilegeModel::with_elevation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElevationOutcome<T> {
    /// The block ran elevated.
    Completed(T),
    /// `what_if` was set; nothing ran.
    DryRun(DryRunReport),
}

/// Caller-supplied elevation prompt.
#[cfg_attr(test, mockall::automock)]
pub trait ElevationStrategy: fmt::Debug {
    /// Ask for elevation to run `operation`; `true` if granted.
    fn request_elevation(&self, operation: &str) -> bool;
}

/// Strategy that always refuses; for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverElevate;

impl ElevationStrategy for NeverElevate {
    fn request_elevation(&self, operation: &str) -> bool {
        tracing::debug!("elevation refused for '{operation}': prompting disabled");
        false
    }
}

/// Privilege requirements derived from a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrivilegeRequirements {
    /// Some entry or declared requirement needs administrator rights.
    pub requires_admin: bool,
    /// `requires_admin` and the session is not elevated.
    pub requires_elevation: bool,
    /// Toggles Windows optional features.
    pub windows_features: bool,
    /// Writes machine-wide registry hives.
    pub registry_access: bool,
    /// Manages services or scheduled tasks.
    pub service_access: bool,
    /// Why each flag was set, in discovery order.
    pub reasons: Vec<String>,
}

/// File roots whose contents belong to the system rather than a user.
const SYSTEM_FILE_ROOTS: &[&str] = &[
    r"c:\windows",
    r"c:\program files",
    r"c:\programdata",
    "%programdata%",
    "%systemroot%",
    "%windir%",
    "%programfiles%",
    "/etc/",
    "/usr/",
    "/var/",
    "/opt/",
    "/library/",
];

const ADMIN_REQUIREMENTS: &[&str] = &["admin", "administrator", "elevated", "elevation"];
/// Token sequences matched against a template's category and declared
/// requirements.
const FEATURE_PATTERNS: &[&str] = &["feature", "optional-feature"];
const SERVICE_PATTERNS: &[&str] = &["service", "scheduled-task", "scheduledtask"];
/// Template names are free text, so only compound sequences count there.
const FEATURE_NAME_PATTERNS: &[&str] = &["windows-feature", "optional-feature"];
const SERVICE_NAME_PATTERNS: &[&str] = &["windows-service", "scheduled-task", "scheduledtask"];

fn is_system_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    SYSTEM_FILE_ROOTS.iter().any(|root| lower.starts_with(root))
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether the tokens of `pattern` appear consecutively in `text`, each
/// optionally pluralised (`windows-features` matches `windows-feature`).
fn has_tokens(text: &str, pattern: &str) -> bool {
    let words = tokens(text);
    let wanted = tokens(pattern);
    !wanted.is_empty()
        && words.windows(wanted.len()).any(|window| {
            window
                .iter()
                .zip(&wanted)
                .all(|(w, p)| w == p || w.strip_suffix('s') == Some(p.as_str()))
        })
}

fn mentions(haystacks: &[&str], patterns: &[&str]) -> Option<String> {
    haystacks.iter().find_map(|h| {
        patterns
            .iter()
            .find(|p| has_tokens(h, p))
            .map(|p| format!("'{h}' matches '{p}'"))
    })
}

/// Session privilege state and dispatch rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivilegeModel {
    state: PrivilegeState,
}

impl PrivilegeModel {
    /// Model with an explicit state.
    #[must_use]
    pub const fn new(state: PrivilegeState) -> Self {
        Self { state }
    }

    /// Probe the current session.
    ///
    /// Windows: `net session` succeeds only for administrators. Elsewhere:
    /// `id -u` prints `0` for root. A probe that cannot run counts as
    /// unprivileged.
    #[must_use]
    pub fn detect(platform: &Platform, executor: &dyn Executor) -> Self {
        let elevated = if platform.is_windows() {
            executor
                .run_unchecked("net", &["session"])
                .is_ok_and(|r| r.success)
        } else {
            executor
                .run_unchecked("id", &["-u"])
                .is_ok_and(|r| r.success && r.stdout.trim() == "0")
        };
        tracing::debug!("privilege probe: elevated = {elevated}");
        Self::new(if elevated {
            PrivilegeState::Elevated
        } else {
            PrivilegeState::Unprivileged
        })
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PrivilegeState {
        self.state
    }

    /// Whether the session is elevated.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        self.state == PrivilegeState::Elevated
    }

    /// Derive privilege requirements from a template's category, name,
    /// declared requirements, and the registry hives and file roots its
    /// entries target.
    #[must_use]
    pub fn classify(&self, template: &Template) -> PrivilegeRequirements {
        let mut req = PrivilegeRequirements::default();
        let meta = &template.metadata;
        let name = [meta.name.as_str()];
        let requirements: Vec<&str> = meta.requirements.iter().map(String::as_str).collect();
        let declared: Vec<&str> = std::iter::once(meta.category.as_str())
            .chain(requirements.iter().copied())
            .collect();

        if let Some(r) = requirements
            .iter()
            .find(|r| ADMIN_REQUIREMENTS.contains(&r.to_lowercase().as_str()))
        {
            req.requires_admin = true;
            req.reasons.push(format!("declares requirement '{r}'"));
        }
        let feature = mentions(&name, FEATURE_NAME_PATTERNS)
            .or_else(|| mentions(&declared, FEATURE_PATTERNS));
        if let Some(reason) = feature {
            req.windows_features = true;
            req.requires_admin = true;
            req.reasons.push(format!("windows features: {reason}"));
        }
        let service = mentions(&name, SERVICE_NAME_PATTERNS)
            .or_else(|| mentions(&declared, SERVICE_PATTERNS));
        if let Some(reason) = service {
            req.service_access = true;
            req.requires_admin = true;
            req.reasons.push(format!("service access: {reason}"));
        }

        for section in [&template.backup, &template.restore] {
            for entry in &section.registry {
                let machine_wide = RegistryPath::parse(&entry.path)
                    .is_some_and(|p| p.hive().is_machine_wide());
                if machine_wide && !req.registry_access {
                    req.registry_access = true;
                    req.requires_admin = true;
                    req.reasons
                        .push(format!("registry entry '{}' targets {}", entry.name, entry.path));
                }
            }
            for entry in &section.files {
                if is_system_path(&entry.path) {
                    req.requires_admin = true;
                    req.reasons
                        .push(format!("file entry '{}' targets {}", entry.name, entry.path));
                }
            }
        }

        req.requires_elevation = req.requires_admin && !self.is_elevated();
        req
    }

    /// Run `main` when allowed, otherwise `fallback` as a degraded result.
    ///
    /// - [`OperationType::User`]: always `main`
    /// - [`OperationType::Admin`] and elevated: `main`, `fallback` ignored
    /// - [`OperationType::Admin`], unelevated: `fallback`, tagged degraded
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeError::AdminRequired`] for an unelevated admin
    /// operation without a fallback, or
    /// [`PrivilegeError::OperationFailed`] if the chosen operation fails.
    pub fn safe_admin_operation<T>(
        &self,
        operation_type: OperationType,
        description: &str,
        main: impl FnOnce() -> Result<T, BoxError>,
        fallback: Option<Operation<'_, T>>,
    ) -> Result<AdminOutcome<T>, PrivilegeError> {
        let failed = |source| PrivilegeError::OperationFailed {
            operation: description.to_string(),
            source,
        };
        if operation_type == OperationType::User || self.is_elevated() {
            return main().map(AdminOutcome::Full).map_err(failed);
        }
        let Some(fallback) = fallback else {
            return Err(PrivilegeError::AdminRequired {
                operation: description.to_string(),
            });
        };
        tracing::warn!("'{description}' requires administrator privileges; running fallback");
        fallback().map(AdminOutcome::Degraded).map_err(failed)
    }

    /// Run a State Store operation, routing [`StoreError::AccessDenied`] to
    /// `fallback`. Access denial is never retried.
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeError::AccessDenied`] when access is denied and
    /// there is no fallback, [`PrivilegeError::Store`] for any other store
    /// error, or [`PrivilegeError::OperationFailed`] if the fallback fails.
    pub fn guard_store<T>(
        &self,
        description: &str,
        main: impl FnOnce() -> Result<T, StoreError>,
        fallback: Option<Operation<'_, T>>,
    ) -> Result<AdminOutcome<T>, PrivilegeError> {
        match main() {
            Ok(value) => Ok(AdminOutcome::Full(value)),
            Err(StoreError::AccessDenied { path }) => match fallback {
                Some(fallback) => {
                    tracing::warn!("'{description}' was denied access to {path}; running fallback");
                    fallback()
                        .map(AdminOutcome::Degraded)
                        .map_err(|source| PrivilegeError::OperationFailed {
                            operation: description.to_string(),
                            source,
                        })
                }
                None => Err(PrivilegeError::AccessDenied {
                    operation: description.to_string(),
                    path,
                }),
            },
            Err(source) => Err(PrivilegeError::Store {
                operation: description.to_string(),
                source,
            }),
        }
    }

    /// Run `block` elevated.
    ///
    /// - `what_if`: nothing runs; returns a [`DryRunReport`]
    /// - already elevated: runs `block`
    /// - unelevated with `no_prompt`: fails
    /// - otherwise asks `strategy`; on grant the model becomes
    ///   [`PrivilegeState::Elevated`] and runs `block`
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeError::ElevationRequired`] when elevation is
    /// unavailable, or [`PrivilegeError::OperationFailed`] if `block` fails.
    pub fn with_elevation<T>(
        &mut self,
        description: &str,
        options: ElevationOptions,
        strategy: &dyn ElevationStrategy,
        block: impl FnOnce() -> Result<T, BoxError>,
    ) -> Result<ElevationOutcome<T>, PrivilegeError> {
        if options.what_if {
            let report = DryRunReport {
                operation: description.to_string(),
                elevated: self.is_elevated(),
                would_request_elevation: !self.is_elevated(),
            };
            tracing::info!(target: "recovery::dry_run", "{report}");
            return Ok(ElevationOutcome::DryRun(report));
        }

        if !self.is_elevated() {
            if options.no_prompt || !strategy.request_elevation(description) {
                return Err(PrivilegeError::ElevationRequired {
                    operation: description.to_string(),
                });
            }
            tracing::info!("elevation granted for '{description}'");
            self.state = PrivilegeState::Elevated;
        }

        block()
            .map(ElevationOutcome::Completed)
            .map_err(|source| PrivilegeError::OperationFailed {
                operation: description.to_string(),
                source,
            })
    }
}
