//! Machine context: a read-only snapshot of the executing machine's identity.
//!
//! Selectors, inheritance rules and conditional sections are all evaluated
//! against a [`MachineContext`]. The snapshot is taken once per run by
//! [`MachineContext::current`] and never refreshed behind the caller's back;
//! identity fields can be overridden with the `with_*` builders so tests and
//! the CLI's `--hostname`/`--machine-name` flags get deterministic results.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ComparisonError;
use crate::platform::Platform;
use crate::store::{StateStore, StorePath};

/// Hardware descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Hardware {
    /// System manufacturer.
    pub manufacturer: String,
    /// System model.
    pub model: String,
    /// Processor description, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    /// Total memory description, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Operating system descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Software {
    /// OS family (`windows`, `linux`, `macos`).
    pub os_family: String,
    /// OS version string.
    pub os_version: String,
}

/// The session the engine runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Current user name.
    pub user: String,
    /// Whether the session holds administrator rights.
    pub elevated: bool,
}

/// Snapshot of the executing machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MachineContext {
    /// Logical machine name.
    pub machine_name: String,
    /// Network host name.
    pub hostname: String,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Hardware descriptors.
    pub hardware: Hardware,
    /// Operating system descriptors.
    pub software: Software,
    /// Session descriptors.
    pub session: Session,
}

/// Lowercase and strip separators so `machine_name`, `MachineName` and
/// `machine-name` address the same field.
fn normalize(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl MachineContext {
    /// Context with the given identity and nothing else (for tests and
    /// fixtures).
    #[must_use]
    pub fn new(machine_name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Snapshot the current machine.
    ///
    /// Performs only reads. `session.elevated` is left `false`; callers that
    /// have probed elevation set it with [`with_elevated`](Self::with_elevated).
    #[must_use]
    pub fn current() -> Self {
        let environment: BTreeMap<String, String> = std::env::vars().collect();
        let hostname = detect_hostname(&environment);
        let machine_name = environment
            .get("COMPUTERNAME")
            .cloned()
            .unwrap_or_else(|| hostname.clone());
        let platform = Platform::detect();
        let user = environment
            .get("USERNAME")
            .or_else(|| environment.get("USER"))
            .cloned()
            .unwrap_or_default();

        let mut hardware = detect_hardware(&environment);
        let mut software = Software {
            os_family: platform.os.to_string(),
            os_version: platform.version,
        };
        #[cfg(windows)]
        apply_windows_registry(
            &crate::store::windows::WindowsRegistry,
            &mut hardware,
            &mut software,
        );
        Self {
            machine_name,
            hostname,
            hardware,
            software,
            session: Session {
                user,
                elevated: false,
            },
            environment,
        }
    }

    /// Override the machine name.
    #[must_use]
    pub fn with_machine_name(mut self, name: impl Into<String>) -> Self {
        self.machine_name = name.into();
        self
    }

    /// Override the host name.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set an environment variable in the snapshot.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    /// Set the hardware descriptors.
    #[must_use]
    pub fn with_hardware(mut self, hardware: Hardware) -> Self {
        self.hardware = hardware;
        self
    }

    /// Set the operating system descriptors.
    #[must_use]
    pub fn with_software(mut self, software: Software) -> Self {
        self.software = software;
        self
    }

    /// Record whether the session is elevated.
    #[must_use]
    pub const fn with_elevated(mut self, elevated: bool) -> Self {
        self.session.elevated = elevated;
        self
    }

    /// Resolve a dotted field path to its string value.
    ///
    /// Returns `Ok(None)` for absent optional values such as an unset
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ComparisonError::UnknownField`] if the path does not name a
    /// context field.
    pub fn field(&self, path: &str) -> Result<Option<String>, ComparisonError> {
        let unknown = || ComparisonError::UnknownField {
            field: path.to_string(),
        };
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };

        match (normalize(root).as_str(), rest) {
            ("machinename" | "computername", None) => Ok(non_empty(&self.machine_name)),
            ("hostname", None) => Ok(non_empty(&self.hostname)),
            ("environment" | "env", Some(name)) => Ok(self
                .environment
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())),
            ("hardware", Some(field)) => match normalize(field).as_str() {
                "manufacturer" => Ok(non_empty(&self.hardware.manufacturer)),
                "model" => Ok(non_empty(&self.hardware.model)),
                "processor" => Ok(self.hardware.processor.clone()),
                "memory" => Ok(self.hardware.memory.clone()),
                _ => Err(unknown()),
            },
            ("software", Some(field)) => match normalize(field).as_str() {
                "osfamily" | "os" => Ok(non_empty(&self.software.os_family)),
                "osversion" | "version" => Ok(non_empty(&self.software.os_version)),
                _ => Err(unknown()),
            },
            ("session", Some(field)) => match normalize(field).as_str() {
                "user" | "username" => Ok(non_empty(&self.session.user)),
                "elevated" | "isadmin" => Ok(Some(self.session.elevated.to_string())),
                _ => Err(unknown()),
            },
            _ => Err(unknown()),
        }
    }
}

fn detect_hostname(environment: &BTreeMap<String, String>) -> String {
    environment
        .get("HOSTNAME")
        .cloned()
        .or_else(|| {
            std::fs::read_to_string("/proc/sys/kernel/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .or_else(|| environment.get("COMPUTERNAME").cloned())
        .unwrap_or_default()
}

fn read_trimmed(path: &str) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn detect_hardware(environment: &BTreeMap<String, String>) -> Hardware {
    let processor = environment
        .get("PROCESSOR_IDENTIFIER")
        .cloned()
        .or_else(|| {
            std::fs::read_to_string("/proc/cpuinfo").ok().and_then(|info| {
                info.lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split_once(':'))
                    .map(|(_, v)| v.trim().to_string())
            })
        });
    let memory = std::fs::read_to_string("/proc/meminfo").ok().and_then(|info| {
        info.lines()
            .find(|l| l.starts_with("MemTotal"))
            .and_then(|l| l.split_once(':'))
            .map(|(_, v)| v.trim().to_string())
    });
    Hardware {
        manufacturer: read_trimmed("/sys/class/dmi/id/sys_vendor").unwrap_or_default(),
        model: read_trimmed("/sys/class/dmi/id/product_name").unwrap_or_default(),
        processor,
        memory,
    }
}

const BIOS_KEY: &str = r"HKLM:\HARDWARE\DESCRIPTION\System\BIOS";
const WINDOWS_VERSION_KEY: &str = r"HKLM:\SOFTWARE\Microsoft\Windows NT\CurrentVersion";

fn registry_text(store: &dyn StateStore, key: &str, name: &str) -> Option<String> {
    store
        .get_optional(&StorePath::parse(key), Some(name))
        .ok()
        .flatten()
        .and_then(|data| data.as_value().map(|value| value.to_string().trim().to_string()))
        .filter(|text| !text.is_empty())
}

/// Fill hardware and OS version from the Windows registry.
///
/// The BIOS key gives manufacturer and model; the OS version is
/// `major.minor.build` from `CurrentVersion`. Missing values leave the
/// existing fields alone.
#[cfg_attr(not(windows), allow(dead_code))]
fn apply_windows_registry(store: &dyn StateStore, hardware: &mut Hardware, software: &mut Software) {
    if let Some(manufacturer) = registry_text(store, BIOS_KEY, "SystemManufacturer") {
        hardware.manufacturer = manufacturer;
    }
    if let Some(model) = registry_text(store, BIOS_KEY, "SystemProductName") {
        hardware.model = model;
    }

    let version = |name: &str| registry_text(store, WINDOWS_VERSION_KEY, name);
    match (
        version("CurrentMajorVersionNumber"),
        version("CurrentMinorVersionNumber"),
        version("CurrentBuildNumber"),
    ) {
        (Some(major), Some(minor), Some(build)) => {
            software.os_version = format!("{major}.{minor}.{build}");
        }
        (_, _, Some(build)) if software.os_version.is_empty() => software.os_version = build,
        _ => {}
    }
}
