// Shared helpers for integration tests.
//
// Provides a temporary directory holding templates and inheritance files,
// plus the "theme" scenario used across test binaries.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use recovery_cli::context::MachineContext;

/// Template with one registry key and one settings file, Light by default.
pub const THEME_TEMPLATE: &str = r#"{
  "metadata": { "name": "theme", "category": "appearance" },
  "backup": {
    "registry": [
      { "name": "app-theme", "path": "HKCU:\\Software\\App", "values": { "Theme": "Light", "AccentColor": 1 } }
    ],
    "files": [
      { "name": "settings", "path": "${env:USERPROFILE}/App/settings.json" }
    ]
  },
  "restore": {
    "registry": [ { "name": "app-theme", "path": "HKCU:\\Software\\App" } ],
    "files": [ { "name": "settings", "path": "${env:USERPROFILE}/App/settings.json" } ]
  }
}"#;

/// Laptops get the dark theme, desktops a different accent, work machines
/// an extra VPN file, and elevated sessions machine-wide policies.
pub const THEME_INHERITANCE: &str = r#"{
  "validation_level": "strict",
  "machine_configurations": [
    {
      "name": "laptop",
      "selectors": { "hostname": "LAPTOP" },
      "overrides": { "backup": { "registry": [ { "name": "app-theme", "values": { "Theme": "Dark" } } ] } }
    },
    {
      "name": "desktop",
      "selectors": { "hostname": { "operator": "matches", "value": "^DESKTOP" } },
      "overrides": { "backup": { "registry": [ { "name": "app-theme", "values": { "AccentColor": 7 } } ] } }
    }
  ],
  "inheritance_rules": [
    {
      "name": "work-machines",
      "conditions": [ { "field": "machine_name", "operator": "contains", "value": "WORK" } ],
      "action": "merge-append",
      "paths": [ "backup.files" ],
      "value": [ { "name": "vpn", "path": "${env:USERPROFILE}/vpn.conf", "optional": true } ]
    }
  ],
  "conditional_sections": [
    {
      "name": "elevated-policies",
      "conditions": [ { "field": "session.elevated", "value": true } ],
      "fragment": { "backup": { "registry": [ { "name": "policies", "path": "HKLM:\\Software\\Policies\\App" } ] } }
    }
  ]
}"#;

/// Context for a machine with the given names and a fixed profile directory.
pub fn machine(machine_name: &str, hostname: &str) -> MachineContext {
    MachineContext::new(machine_name, hostname).with_env("USERPROFILE", "/home/alice")
}

/// A temporary directory of template and inheritance files.
pub struct Fixture {
    /// Backing directory, deleted on drop.
    pub dir: tempfile::TempDir,
}

impl Fixture {
    /// Empty fixture.
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Fixture directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` inside the fixture and return its path.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write fixture file");
        path
    }

    /// Fixture holding the theme template and inheritance file.
    pub fn theme() -> (Self, PathBuf, PathBuf) {
        let fixture = Self::new();
        let template = fixture.write("templates/theme.json", THEME_TEMPLATE);
        let inheritance = fixture.write("inheritance.json", THEME_INHERITANCE);
        (fixture, template, inheritance)
    }
}
