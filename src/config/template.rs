//! Template documents: what to back up and restore, independent of any
//! specific machine.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Extra entry fields not interpreted by the engine, carried through
/// resolution untouched.
pub type Extra = BTreeMap<String, serde_json::Value>;

/// Template metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Template name; required and non-blank.
    pub name: String,
    /// Template version.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Category tag (e.g. `system`, `gaming`, `windows-features`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Declared requirements (e.g. `admin`, `service-access`).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
}

/// How a prerequisite is probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrerequisiteKind {
    /// Run `check` in the platform shell and match its output.
    #[default]
    Script,
    /// `check` is a registry key that must exist.
    Registry,
    /// `check` is a filesystem path that must exist.
    File,
}

/// What to do when a prerequisite is not satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnMissing {
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Abort the template.
    Fail,
    /// Skip the template without error.
    Skip,
}

impl fmt::Display for OnMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => f.write_str("warn"),
            Self::Fail => f.write_str("fail"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// A check that must hold before the template is acted on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Probe kind.
    #[serde(default, rename = "type")]
    pub kind: PrerequisiteKind,
    /// Name shown in diagnostics.
    #[serde(default)]
    pub name: String,
    /// Probe command (script) or path (registry/file).
    #[serde(default)]
    pub check: String,
    /// Regular expression the probe's trimmed output must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Policy when the probe fails.
    #[serde(default)]
    pub on_missing: OnMissing,
}

/// Registry key to capture or restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Logical entry name; restore entries pair with backup entries by it.
    #[serde(default)]
    pub name: String,
    /// Key path (`HKCU:\Software\App`).
    #[serde(default)]
    pub path: String,
    /// Value name to desired data (shorthand or `{type, data}`); `null`
    /// captures whatever is present.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, serde_json::Value>,
    /// Backup entry this restore entry pairs with, when not `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,
    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Whether a file entry names a file or a directory tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// A single file.
    #[default]
    File,
    /// A directory, copied recursively.
    Directory,
}

/// File or directory to capture or restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Logical backup name.
    #[serde(default)]
    pub name: String,
    /// Source path; may contain `${...}` placeholders.
    #[serde(default)]
    pub path: String,
    /// File or directory.
    #[serde(default, rename = "type")]
    pub kind: FileKind,
    /// A missing source is not an error.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Backup entry this restore entry pairs with, when not `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,
    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Installed application to record or reinstall.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEntry {
    /// Logical entry name.
    #[serde(default)]
    pub name: String,
    /// Package identifier.
    #[serde(default)]
    pub id: String,
    /// Package manager that owns `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    /// Backup entry this restore entry pairs with, when not `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,
    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Entry kinds shared by backup and restore sections.
pub trait Entry {
    /// Section key (`registry`, `files`, `applications`).
    const KIND: &'static str;

    /// Logical name.
    fn name(&self) -> &str;

    /// Name of the backup entry this entry pairs with.
    fn pairing_name(&self) -> &str;

    /// Required locator fields as `(field, value)` pairs.
    fn locators(&self) -> Vec<(&'static str, &str)>;
}

macro_rules! impl_entry {
    ($ty:ty, $kind:literal, $($field:ident),+) => {
        impl Entry for $ty {
            const KIND: &'static str = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn pairing_name(&self) -> &str {
                self.backup_name.as_deref().unwrap_or(&self.name)
            }

            fn locators(&self) -> Vec<(&'static str, &str)> {
                vec![$((stringify!($field), self.$field.as_str())),+]
            }
        }
    };
}

impl_entry!(RegistryEntry, "registry", path);
impl_entry!(FileEntry, "files", path);
impl_entry!(ApplicationEntry, "applications", id);

/// A backup or restore section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    /// Registry entries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub registry: Vec<RegistryEntry>,
    /// File entries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
    /// Application entries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<ApplicationEntry>,
}

impl Section {
    /// Whether the section has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.registry.is_empty() && self.files.is_empty() && self.applications.is_empty()
    }

    /// Total number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.registry.len() + self.files.len() + self.applications.len()
    }
}

/// Raw document shape, accepting top-level entry lists as the backup
/// section.
#[derive(Deserialize)]
struct TemplateDocument {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    prerequisites: Vec<Prerequisite>,
    backup: Option<Section>,
    #[serde(default)]
    restore: Section,
    #[serde(default)]
    registry: Vec<RegistryEntry>,
    #[serde(default)]
    files: Vec<FileEntry>,
    #[serde(default)]
    applications: Vec<ApplicationEntry>,
}

/// A loaded template. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TemplateDocument")]
pub struct Template {
    /// Metadata.
    pub metadata: Metadata,
    /// Ordered prerequisite checks.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<Prerequisite>,
    /// State to capture.
    pub backup: Section,
    /// State to restore.
    pub restore: Section,
}

impl From<TemplateDocument> for Template {
    fn from(doc: TemplateDocument) -> Self {
        let backup = doc.backup.unwrap_or(Section {
            registry: doc.registry,
            files: doc.files,
            applications: doc.applications,
        });
        Self {
            metadata: doc.metadata,
            prerequisites: doc.prerequisites,
            backup,
            restore: doc.restore,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_document() {
        let template: Template = serde_json::from_value(json!({
            "metadata": { "name": "app", "version": "1.0", "category": "system" },
            "prerequisites": [
                { "type": "script", "name": "pwsh", "check": "$PSVersionTable", "on_missing": "fail" }
            ],
            "backup": {
                "registry": [{ "name": "theme", "path": "HKCU:\\App", "values": { "Theme": "Light" } }],
                "files": [{ "name": "cfg", "path": "${env:APPDATA}\\app.json", "optional": true }]
            },
            "restore": {
                "registry": [{ "name": "theme", "path": "HKCU:\\App" }]
            }
        }))
        .unwrap();
        assert_eq!(template.metadata.name, "app");
        assert_eq!(template.prerequisites[0].on_missing, OnMissing::Fail);
        assert_eq!(template.backup.registry[0].values["Theme"], json!("Light"));
        assert!(template.backup.files[0].optional);
        assert_eq!(template.restore.registry.len(), 1);
    }

    #[test]
    fn top_level_entries_become_backup_section() {
        let template: Template = serde_json::from_value(json!({
            "metadata": { "name": "legacy" },
            "registry": [{ "name": "r", "path": "HKCU:\\X" }],
            "applications": [{ "name": "git", "id": "Git.Git" }]
        }))
        .unwrap();
        assert_eq!(template.backup.registry.len(), 1);
        assert_eq!(template.backup.applications[0].id, "Git.Git");
    }

    #[test]
    fn explicit_backup_wins_over_top_level() {
        let template: Template = serde_json::from_value(json!({
            "metadata": { "name": "t" },
            "backup": { "files": [{ "name": "a", "path": "/a" }] },
            "registry": [{ "name": "ignored", "path": "HKCU:\\X" }]
        }))
        .unwrap();
        assert!(template.backup.registry.is_empty());
        assert_eq!(template.backup.files.len(), 1);
    }

    #[test]
    fn missing_metadata_parses_as_blank_name() {
        let template: Template = serde_json::from_value(json!({})).unwrap();
        assert!(template.metadata.name.is_empty());
        assert!(template.backup.is_empty());
    }

    #[test]
    fn pairing_name_defaults_to_name() {
        let entry = FileEntry {
            name: "docs".to_string(),
            ..FileEntry::default()
        };
        assert_eq!(entry.pairing_name(), "docs");
        let entry = FileEntry {
            name: "docs-restore".to_string(),
            backup_name: Some("docs".to_string()),
            ..FileEntry::default()
        };
        assert_eq!(entry.pairing_name(), "docs");
        assert_eq!(<FileEntry as Entry>::KIND, "files");
    }

    #[test]
    fn extra_fields_are_preserved() {
        let entry: RegistryEntry = serde_json::from_value(json!({
            "name": "r", "path": "HKCU:\\X", "description": "kept"
        }))
        .unwrap();
        assert_eq!(entry.extra["description"], json!("kept"));
        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["description"], json!("kept"));
    }

    #[test]
    fn serialization_omits_empty_collections() {
        let section = Section {
            files: vec![FileEntry {
                name: "a".to_string(),
                path: "/a".to_string(),
                ..FileEntry::default()
            }],
            ..Section::default()
        };
        let value = serde_json::to_value(&section).unwrap();
        assert!(value.get("registry").is_none());
        assert_eq!(value["files"][0], json!({ "name": "a", "path": "/a", "type": "file" }));
    }
}
