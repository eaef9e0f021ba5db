#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `resolve` command: templates and inheritance
//! files loaded from disk and resolved for different machines.

mod common;

use common::*;
use recovery_cli::commands::inheritance_or_default;
use recovery_cli::commands::resolve::{resolve_all, resolve_file};
use recovery_cli::config::{ValidationLevel, discover_templates, load_inheritance};
use recovery_cli::engine::ResolvedConfiguration;
use recovery_cli::error::{RecoveryError, ResolveError, TemplateError, ValidationError};

/// One line per entry plus the applied layers, for snapshots.
fn describe(resolved: &ResolvedConfiguration) -> Vec<String> {
    let list = |names: &[String]| {
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    };
    let mut lines = vec![
        format!("machine configurations: {}", list(&resolved.applied.machine_configurations)),
        format!("inheritance rules: {}", list(&resolved.applied.inheritance_rules)),
        format!("conditional sections: {}", list(&resolved.applied.conditional_sections)),
    ];
    for (section, entries) in [("backup", &resolved.backup), ("restore", &resolved.restore)] {
        for entry in &entries.registry {
            let values: Vec<String> = entry.values.iter().map(|(k, v)| format!("{k}={v}")).collect();
            lines.push(format!("{section}.registry {} {} {}", entry.name, entry.path, values.join(" ")).trim_end().to_string());
        }
        for entry in &entries.files {
            let optional = if entry.optional { " optional" } else { "" };
            lines.push(format!("{section}.files {} {}{optional}", entry.name, entry.path));
        }
    }
    lines
}

fn theme_for(machine_name: &str, hostname: &str) -> ResolvedConfiguration {
    let (_fixture, template, inheritance) = Fixture::theme();
    let inheritance = load_inheritance(&inheritance).unwrap();
    resolve_file(&template, &inheritance, &machine(machine_name, hostname), None)
        .unwrap()
        .configuration
}

// ---------------------------------------------------------------------------
// Theme scenario
// ---------------------------------------------------------------------------

#[test]
fn theme_work_laptop() {
    let resolved = theme_for("WORK-LAPTOP", "LAPTOP");
    insta::assert_snapshot!("theme_work_laptop", describe(&resolved).join("\n"));
}

#[test]
fn theme_laptop_gets_dark() {
    let resolved = theme_for("HOME-LAPTOP", "LAPTOP");
    assert_eq!(resolved.backup.registry[0].values["Theme"], "Dark");
    assert_eq!(resolved.backup.registry[0].values["AccentColor"], 1);
    assert_eq!(resolved.applied.machine_configurations, vec!["laptop"]);
    assert!(resolved.applied.inheritance_rules.is_empty());
    assert_eq!(resolved.backup.files.len(), 1);
}

#[test]
fn theme_desktop_keeps_light() {
    let resolved = theme_for("HOME-PC", "DESKTOP-01");
    assert_eq!(resolved.backup.registry[0].values["Theme"], "Light");
    assert_eq!(resolved.backup.registry[0].values["AccentColor"], 7);
    assert_eq!(resolved.applied.machine_configurations, vec!["desktop"]);
}

#[test]
fn theme_unknown_machine_is_baseline() {
    let resolved = theme_for("KIOSK", "KIOSK");
    assert_eq!(resolved.backup.registry[0].values["Theme"], "Light");
    assert!(resolved.applied.machine_configurations.is_empty());
    assert_eq!(resolved.backup.files[0].path, "/home/alice/App/settings.json");
}

#[test]
fn elevated_session_adds_policies() {
    let (_fixture, template, inheritance) = Fixture::theme();
    let inheritance = load_inheritance(&inheritance).unwrap();
    let ctx = machine("HOME-PC", "DESKTOP-01").with_elevated(true);
    let report = resolve_file(&template, &inheritance, &ctx, None).unwrap();
    let names: Vec<&str> = report
        .configuration
        .backup
        .registry
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names, vec!["app-theme", "policies"]);
    assert_eq!(
        report.configuration.applied.conditional_sections,
        vec!["elevated-policies"]
    );
}

// ---------------------------------------------------------------------------
// Determinism and fingerprints
// ---------------------------------------------------------------------------

#[test]
fn resolution_is_deterministic() {
    let (_fixture, template, inheritance) = Fixture::theme();
    let inheritance = load_inheritance(&inheritance).unwrap();
    let ctx = machine("WORK-LAPTOP", "LAPTOP");
    let first = resolve_file(&template, &inheritance, &ctx, None).unwrap();
    let second = resolve_file(&template, &inheritance, &ctx, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.fingerprint.len(), 64);
    assert!(first.fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn different_machines_have_different_fingerprints() {
    let (_fixture, template, inheritance) = Fixture::theme();
    let inheritance = load_inheritance(&inheritance).unwrap();
    let laptop = resolve_file(&template, &inheritance, &machine("A", "LAPTOP"), None).unwrap();
    let desktop = resolve_file(&template, &inheritance, &machine("A", "DESKTOP"), None).unwrap();
    assert_ne!(laptop.fingerprint, desktop.fingerprint);
}

#[test]
fn report_serializes_fingerprint_and_configuration() {
    let (_fixture, template, inheritance) = Fixture::theme();
    let inheritance = load_inheritance(&inheritance).unwrap();
    let report = resolve_file(&template, &inheritance, &machine("A", "LAPTOP"), None).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["fingerprint"], report.fingerprint.as_str());
    assert_eq!(json["configuration"]["metadata"]["name"], "theme");
    assert!(json.get("warnings").is_none());
}

// ---------------------------------------------------------------------------
// Validation levels
// ---------------------------------------------------------------------------

const UNPAIRED: &str = r#"{
  "metadata": { "name": "unpaired" },
  "backup": { "files": [ { "name": "a", "path": "/a" } ] },
  "restore": { "files": [ { "name": "b", "path": "/b" } ] }
}"#;

#[test]
fn strict_rejects_unpaired_restore() {
    let fixture = Fixture::new();
    let template = fixture.write("unpaired.json", UNPAIRED);
    let inheritance = inheritance_or_default(None).unwrap();
    let err = resolve_file(
        &template,
        &inheritance,
        &machine("A", "B"),
        Some(ValidationLevel::Strict),
    )
    .unwrap_err();
    assert!(err.to_string().contains("restore files entry 'b'"), "{err}");
    assert!(matches!(
        err,
        RecoveryError::Resolve(ResolveError::Validation(ValidationError::BrokenPairing { .. }))
    ));
}

#[test]
fn moderate_reports_unpaired_restore_as_warning() {
    let fixture = Fixture::new();
    let template = fixture.write("unpaired.json", UNPAIRED);
    let inheritance = inheritance_or_default(None).unwrap();
    let report = resolve_file(&template, &inheritance, &machine("A", "B"), None).unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("[pairing]"));
}

#[test]
fn minimal_ignores_unpaired_restore() {
    let fixture = Fixture::new();
    let template = fixture.write("unpaired.json", UNPAIRED);
    let inheritance = inheritance_or_default(None).unwrap();
    let report = resolve_file(
        &template,
        &inheritance,
        &machine("A", "B"),
        Some(ValidationLevel::Minimal),
    )
    .unwrap();
    assert!(report.warnings.is_empty());
}

// ---------------------------------------------------------------------------
// TOML inheritance and directories
// ---------------------------------------------------------------------------

#[test]
fn toml_inheritance_file() {
    let (fixture, template, _) = Fixture::theme();
    let inheritance = fixture.write(
        "inheritance.toml",
        r#"
validation_level = "strict"
rule_mode = "first-match"

[[machine_configurations]]
name = "laptop"
selectors = { hostname = { operator = "equals_ci", value = "laptop" } }

[[machine_configurations.overrides.backup.registry]]
name = "app-theme"
values = { Theme = "Dark" }

[[inheritance_rules]]
name = "no-settings"
action = "skip"
paths = ["backup.files.settings", "restore.files.settings"]

[[inheritance_rules]]
name = "ignored"
action = "override"
paths = ["backup.files.settings"]
value = { name = "settings", path = "/never" }
"#,
    );
    let inheritance = load_inheritance(&inheritance).unwrap();
    let resolved = resolve_file(&template, &inheritance, &machine("A", "LAPTOP"), None)
        .unwrap()
        .configuration;
    assert_eq!(resolved.backup.registry[0].values["Theme"], "Dark");
    assert!(resolved.backup.files.is_empty());
    assert!(resolved.restore.files.is_empty());
    assert_eq!(resolved.applied.inheritance_rules, vec!["no-settings"]);
}

#[test]
fn directory_resolution_keeps_order_and_isolates_failures() {
    let fixture = Fixture::new();
    fixture.write("templates/theme.json", THEME_TEMPLATE);
    fixture.write("templates/broken.json", "{ not json");
    fixture.write(
        "templates/shell.toml",
        "[metadata]\nname = \"shell\"\n\n[[backup.files]]\nname = \"profile\"\npath = \"${env:USERPROFILE}/.profile\"\n",
    );
    fixture.write("templates/README.md", "ignored");

    let paths = discover_templates(&fixture.path().join("templates")).unwrap();
    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["broken.json", "shell.toml", "theme.json"]);

    let inheritance = inheritance_or_default(None).unwrap();
    let results = resolve_all(&paths, &inheritance, &machine("A", "LAPTOP"), None);
    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_err());
    let shell = results[1].1.as_ref().unwrap();
    assert_eq!(shell.configuration.backup.files[0].path, "/home/alice/.profile");
    assert!(results[2].1.is_ok());
}

#[test]
fn missing_template_is_not_found() {
    let fixture = Fixture::new();
    let inheritance = inheritance_or_default(None).unwrap();
    let err = resolve_file(
        &fixture.path().join("absent.json"),
        &inheritance,
        &machine("A", "B"),
        None,
    )
    .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
    assert!(matches!(err, RecoveryError::Template(TemplateError::NotFound { .. })));
}
