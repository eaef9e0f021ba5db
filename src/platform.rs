//! Host platform detection.
use std::fmt;

use crate::exec::Executor;

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux.
    Linux,
    /// Windows.
    Windows,
    /// macOS.
    MacOs,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
            Self::MacOs => write!(f, "macos"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// Free-form OS version string (kernel release, Windows build, ...).
    pub version: String,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            version: Self::detect_version(),
        }
    }

    /// Create a platform with explicit values (for testing).
    #[must_use]
    pub fn new(os: Os, version: impl Into<String>) -> Self {
        Self {
            os,
            version: version.into(),
        }
    }

    /// Whether this is a Windows host.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Shell used to run script probes: `(program, leading args)`.
    ///
    /// Prefers `pwsh`, then Windows `powershell`, then `sh -c`.
    #[must_use]
    pub fn script_shell(&self, executor: &dyn Executor) -> (&'static str, &'static [&'static str]) {
        const PWSH_ARGS: &[&str] = &["-NoProfile", "-NonInteractive", "-Command"];
        if executor.which("pwsh") {
            ("pwsh", PWSH_ARGS)
        } else if self.is_windows() && executor.which("powershell") {
            ("powershell", PWSH_ARGS)
        } else {
            ("sh", &["-c"])
        }
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else {
            // Default to Linux for other Unix-like systems
            Os::Linux
        }
    }

    fn detect_version() -> String {
        if cfg!(target_os = "linux") {
            std::fs::read_to_string("/proc/sys/kernel/osrelease")
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockExecutor;

    #[test]
    fn platform_detect_matches_target() {
        let p = Platform::detect();
        assert_eq!(p.is_windows(), cfg!(target_os = "windows"));
    }

    #[test]
    fn os_display() {
        assert_eq!(Os::Linux.to_string(), "linux");
        assert_eq!(Os::Windows.to_string(), "windows");
        assert_eq!(Os::MacOs.to_string(), "macos");
    }

    #[test]
    fn script_shell_prefers_pwsh() {
        let mut exec = MockExecutor::new();
        exec.expect_which().returning(|p| p == "pwsh");
        let (program, args) = Platform::new(Os::Linux, "").script_shell(&exec);
        assert_eq!(program, "pwsh");
        assert_eq!(args.last(), Some(&"-Command"));
    }

    #[test]
    fn script_shell_uses_windows_powershell() {
        let mut exec = MockExecutor::new();
        exec.expect_which().returning(|p| p == "powershell");
        let (program, _) = Platform::new(Os::Windows, "10.0").script_shell(&exec);
        assert_eq!(program, "powershell");
    }

    #[test]
    fn script_shell_falls_back_to_sh() {
        let mut exec = MockExecutor::new();
        exec.expect_which().returning(|_| false);
        let (program, args) = Platform::new(Os::Linux, "").script_shell(&exec);
        assert_eq!(program, "sh");
        assert_eq!(args, &["-c"]);
    }
}
