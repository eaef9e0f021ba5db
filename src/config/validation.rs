//! Checks applied to templates and resolved configurations.
use std::collections::BTreeSet;
use std::fmt;

use super::inheritance::ValidationLevel;
use super::template::{Entry, Metadata, Section, Template};
use crate::error::{TemplateError, ValidationError};
use crate::store::RegistryPath;
use crate::store::Value;

/// A validation finding reported as a warning rather than a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Validator that produced the finding (e.g. `pairing`, `registry`).
    pub validator: &'static str,
    /// The finding.
    pub error: ValidationError,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.validator, self.error)
    }
}

/// Trait for resolved-configuration validators.
///
/// Implementations report findings whose severity depends on the
/// [`ValidationLevel`]; see [`apply_level`].
pub trait ConfigValidator {
    /// Validate and return every finding.
    fn validate(&self) -> Vec<ValidationError>;

    /// Return a human-readable name for this validator.
    fn name(&self) -> &'static str;
}

fn missing_in<E: Entry>(section: &str, entries: &[E], locators: bool) -> Option<String> {
    entries.iter().enumerate().find_map(|(i, entry)| {
        if entry.name().trim().is_empty() {
            return Some(format!("{section}.{}[{i}].name", E::KIND));
        }
        if !locators {
            return None;
        }
        entry
            .locators()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| format!("{section}.{}[{i}].{field}", E::KIND))
    })
}

/// First required field that is missing or blank, as a dotted path.
///
/// Backup entries need a `name` and a locator (`path` or `id`); restore
/// entries only need a `name` since they inherit the locator from the
/// paired backup entry.
#[must_use]
pub fn missing_field(metadata: &Metadata, backup: &Section, restore: &Section) -> Option<String> {
    if metadata.name.trim().is_empty() {
        return Some("metadata.name".to_string());
    }
    missing_in("backup", &backup.registry, true)
        .or_else(|| missing_in("backup", &backup.files, true))
        .or_else(|| missing_in("backup", &backup.applications, true))
        .or_else(|| missing_in("restore", &restore.registry, false))
        .or_else(|| missing_in("restore", &restore.files, false))
        .or_else(|| missing_in("restore", &restore.applications, false))
}

/// Validate a template's schema.
///
/// # Errors
///
/// Returns [`TemplateError::Schema`] naming the first missing field.
/// Always fatal regardless of validation level.
pub fn validate_schema(template: &Template) -> Result<(), TemplateError> {
    match missing_field(&template.metadata, &template.backup, &template.restore) {
        Some(field) => Err(TemplateError::Schema { field }),
        None => Ok(()),
    }
}

/// Check that every registry value in both sections maps onto a typed value.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] for the first unsupported value.
pub fn check_values(backup: &Section, restore: &Section) -> Result<(), ValidationError> {
    for entry in backup.registry.iter().chain(&restore.registry) {
        for (value_name, data) in &entry.values {
            Value::from_template_data(data).map_err(|e| ValidationError::InvalidValue {
                entry: entry.name.clone(),
                value: value_name.clone(),
                reason: e.to_string(),
            })?;
        }
    }
    Ok(())
}

/// Validator for backup/restore pairing.
#[derive(Debug)]
pub struct PairingValidator<'a> {
    backup: &'a Section,
    restore: &'a Section,
}

impl<'a> PairingValidator<'a> {
    /// Validate `restore` against `backup`.
    #[must_use]
    pub const fn new(backup: &'a Section, restore: &'a Section) -> Self {
        Self { backup, restore }
    }
}

fn broken<E: Entry>(backup: &[E], restore: &[E]) -> Vec<ValidationError> {
    let names: BTreeSet<&str> = backup.iter().map(|entry| entry.name()).collect();
    restore
        .iter()
        .filter(|entry| !names.contains(entry.pairing_name()))
        .map(|entry| ValidationError::BrokenPairing {
            kind: E::KIND.to_string(),
            name: entry.pairing_name().to_string(),
        })
        .collect()
}

impl ConfigValidator for PairingValidator<'_> {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = broken(&self.backup.registry, &self.restore.registry);
        errors.extend(broken(&self.backup.files, &self.restore.files));
        errors.extend(broken(&self.backup.applications, &self.restore.applications));
        errors
    }

    fn name(&self) -> &'static str {
        "pairing"
    }
}

/// Validator for registry entry roots.
#[derive(Debug)]
pub struct RegistryRootValidator<'a> {
    sections: [&'a Section; 2],
}

impl<'a> RegistryRootValidator<'a> {
    /// Validate registry entries in both sections.
    #[must_use]
    pub const fn new(backup: &'a Section, restore: &'a Section) -> Self {
        Self {
            sections: [backup, restore],
        }
    }
}

impl ConfigValidator for RegistryRootValidator<'_> {
    fn validate(&self) -> Vec<ValidationError> {
        self.sections
            .iter()
            .flat_map(|section| &section.registry)
            // Restore entries without a path inherit the backup entry's.
            .filter(|entry| !entry.path.is_empty())
            .filter(|entry| RegistryPath::parse(&entry.path).is_none())
            .map(|entry| ValidationError::InvalidRegistryRoot {
                entry: entry.name.clone(),
                path: entry.path.clone(),
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "registry"
    }
}

/// Validator for placeholders left unresolved after expansion.
#[derive(Debug)]
pub struct PlaceholderValidator<'a> {
    unresolved: &'a [(String, String)],
}

impl<'a> PlaceholderValidator<'a> {
    /// Report each `(document path, placeholder)` pair.
    #[must_use]
    pub const fn new(unresolved: &'a [(String, String)]) -> Self {
        Self { unresolved }
    }
}

impl ConfigValidator for PlaceholderValidator<'_> {
    fn validate(&self) -> Vec<ValidationError> {
        self.unresolved
            .iter()
            .map(|(field, placeholder)| ValidationError::UnresolvedPlaceholder {
                field: field.clone(),
                placeholder: placeholder.clone(),
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "placeholders"
    }
}

/// Run `validators` at `level`.
///
/// `minimal` runs none, `moderate` returns every finding as a warning and
/// `strict` fails on the first finding.
///
/// # Errors
///
/// Returns the first finding when `level` is [`ValidationLevel::Strict`].
pub fn apply_level(
    level: ValidationLevel,
    validators: &[&dyn ConfigValidator],
) -> Result<Vec<ValidationWarning>, ValidationError> {
    if level == ValidationLevel::Minimal {
        return Ok(Vec::new());
    }
    let mut warnings = Vec::new();
    for validator in validators {
        for error in validator.validate() {
            if level == ValidationLevel::Strict {
                return Err(error);
            }
            warnings.push(ValidationWarning {
                validator: validator.name(),
                error,
            });
        }
    }
    Ok(warnings)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::template::{ApplicationEntry, FileEntry, RegistryEntry};
    use serde_json::json;

    fn registry(name: &str, path: &str) -> RegistryEntry {
        RegistryEntry {
            name: name.to_string(),
            path: path.to_string(),
            ..RegistryEntry::default()
        }
    }

    fn template(backup: Section, restore: Section) -> Template {
        Template {
            metadata: Metadata {
                name: "t".to_string(),
                ..Metadata::default()
            },
            prerequisites: Vec::new(),
            backup,
            restore,
        }
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    #[test]
    fn schema_requires_metadata_name() {
        let mut t = template(Section::default(), Section::default());
        t.metadata.name = "  ".to_string();
        let err = validate_schema(&t).unwrap_err();
        assert!(matches!(err, TemplateError::Schema { field } if field == "metadata.name"));
    }

    #[test]
    fn schema_requires_entry_locators() {
        let backup = Section {
            applications: vec![ApplicationEntry {
                name: "git".to_string(),
                ..ApplicationEntry::default()
            }],
            ..Section::default()
        };
        let err = validate_schema(&template(backup, Section::default())).unwrap_err();
        assert!(
            matches!(&err, TemplateError::Schema { field } if field == "backup.applications[0].id"),
            "{err}"
        );
    }

    #[test]
    fn schema_requires_entry_names() {
        let backup = Section {
            files: vec![FileEntry {
                path: "/a".to_string(),
                ..FileEntry::default()
            }],
            ..Section::default()
        };
        let err = validate_schema(&template(backup, Section::default())).unwrap_err();
        assert!(matches!(&err, TemplateError::Schema { field } if field == "backup.files[0].name"));
    }

    #[test]
    fn restore_entries_need_only_a_name() {
        let backup = Section {
            registry: vec![registry("theme", r"HKCU:\App")],
            ..Section::default()
        };
        let restore = Section {
            registry: vec![registry("theme", "")],
            ..Section::default()
        };
        assert!(validate_schema(&template(backup, restore)).is_ok());
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    #[test]
    fn check_values_rejects_negative_numbers() {
        let mut entry = registry("theme", r"HKCU:\App");
        entry.values.insert("Size".to_string(), json!(-1));
        let backup = Section {
            registry: vec![entry],
            ..Section::default()
        };
        let err = check_values(&backup, &Section::default()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { value, .. } if value == "Size"));
    }

    // -----------------------------------------------------------------------
    // Pairing / roots
    // -----------------------------------------------------------------------

    #[test]
    fn pairing_detects_dangling_restore() {
        let backup = Section {
            registry: vec![registry("theme", r"HKCU:\App")],
            ..Section::default()
        };
        let restore = Section {
            registry: vec![registry("theme", ""), registry("nonexistent", "")],
            ..Section::default()
        };
        let errors = PairingValidator::new(&backup, &restore).validate();
        assert_eq!(
            errors,
            vec![ValidationError::BrokenPairing {
                kind: "registry".to_string(),
                name: "nonexistent".to_string(),
            }]
        );
    }

    #[test]
    fn pairing_honours_backup_name() {
        let backup = Section {
            files: vec![FileEntry {
                name: "docs".to_string(),
                path: "/docs".to_string(),
                ..FileEntry::default()
            }],
            ..Section::default()
        };
        let restore = Section {
            files: vec![FileEntry {
                name: "docs-to-d".to_string(),
                path: "D:/docs".to_string(),
                backup_name: Some("docs".to_string()),
                ..FileEntry::default()
            }],
            ..Section::default()
        };
        assert!(PairingValidator::new(&backup, &restore).validate().is_empty());
    }

    #[test]
    fn registry_roots_must_be_hives() {
        let backup = Section {
            registry: vec![registry("ok", r"HKLM:\Software"), registry("bad", r"HKXX:\Nope")],
            ..Section::default()
        };
        let errors = RegistryRootValidator::new(&backup, &Section::default()).validate();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ValidationError::InvalidRegistryRoot { entry, .. } if entry == "bad"));
    }

    // -----------------------------------------------------------------------
    // Levels
    // -----------------------------------------------------------------------

    fn findings() -> Vec<(String, String)> {
        vec![("backup.files[0].path".to_string(), "${env.NOPE}".to_string())]
    }

    #[test]
    fn minimal_ignores_findings() {
        let unresolved = findings();
        let v = PlaceholderValidator::new(&unresolved);
        assert!(apply_level(ValidationLevel::Minimal, &[&v]).unwrap().is_empty());
    }

    #[test]
    fn moderate_reports_warnings() {
        let unresolved = findings();
        let v = PlaceholderValidator::new(&unresolved);
        let warnings = apply_level(ValidationLevel::Moderate, &[&v]).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].validator, "placeholders");
        assert!(warnings[0].to_string().starts_with("[placeholders]"));
    }

    #[test]
    fn strict_fails_on_first_finding() {
        let unresolved = findings();
        let v = PlaceholderValidator::new(&unresolved);
        let err = apply_level(ValidationLevel::Strict, &[&v]).unwrap_err();
        assert!(matches!(err, ValidationError::UnresolvedPlaceholder { .. }));
    }
}
