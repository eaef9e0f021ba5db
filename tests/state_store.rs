#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
//! Integration tests for the routed state store and its interaction with
//! the privilege model.

use std::sync::Arc;

use recovery_cli::error::{PrivilegeError, StoreError};
use recovery_cli::privilege::{AdminOutcome, PrivilegeModel, PrivilegeState};
use recovery_cli::store::{
    EntryKind, FileStore, Hive, MemoryRegistry, StateStore, Store, StoreData, StorePath, Value,
    ValueKind,
};

fn store(registry: MemoryRegistry) -> Store {
    Store::new(Arc::new(registry), Arc::new(FileStore))
}

#[test]
fn routes_registry_paths_to_registry_backend() {
    let store = store(MemoryRegistry::new());
    let key = StorePath::parse(r"HKCU:\Software\App");
    store
        .set(&key, "Theme", &Value::String("Dark".to_string()), ValueKind::String)
        .unwrap();
    assert!(store.exists(&key));
    assert_eq!(
        store.get(&key, Some("Theme")).unwrap(),
        StoreData::Value(Value::String("Dark".to_string()))
    );
}

#[test]
fn routes_file_paths_to_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(MemoryRegistry::new());
    let target = StorePath::file(dir.path().join("app"));
    store.create(&target, EntryKind::Directory).unwrap();
    store
        .set(&target, "settings.json", &Value::Binary(b"{}".to_vec()), ValueKind::Binary)
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("app/settings.json")).unwrap(),
        "{}"
    );
    let values = store.get(&target, None).unwrap();
    assert_eq!(
        values.as_values().unwrap()["settings.json"],
        Value::Binary(b"{}".to_vec())
    );
}

#[test]
fn missing_entries_are_optional() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(MemoryRegistry::new());
    assert!(
        store
            .get_optional(&StorePath::parse(r"HKCU:\Software\Missing"), None)
            .unwrap()
            .is_none()
    );
    assert!(
        store
            .get_optional(&StorePath::file(dir.path().join("missing")), None)
            .unwrap()
            .is_none()
    );
}

#[test]
fn denied_write_degrades_through_privilege_model() {
    let store = store(MemoryRegistry::new().deny_writes(Hive::LocalMachine));
    let model = PrivilegeModel::new(PrivilegeState::Unprivileged);
    let machine_key = StorePath::parse(r"HKLM:\Software\Policies\App");
    let user_key = StorePath::parse(r"HKCU:\Software\Policies\App");
    let value = Value::Dword(1);

    let outcome = model
        .guard_store(
            "write policy",
            || store.set(&machine_key, "Enabled", &value, ValueKind::Dword),
            Some(Box::new(|| {
                store
                    .set(&user_key, "Enabled", &value, ValueKind::Dword)
                    .map_err(Into::into)
            })),
        )
        .unwrap();
    assert_eq!(outcome, AdminOutcome::Degraded(()));
    assert!(!store.exists(&machine_key));
    assert!(store.exists(&user_key));
}

#[test]
fn denied_write_without_fallback_names_path() {
    let store = store(MemoryRegistry::new().deny_writes(Hive::LocalMachine));
    let model = PrivilegeModel::new(PrivilegeState::Unprivileged);
    let key = StorePath::parse(r"HKLM:\Software\App");
    let err = model
        .guard_store(
            "write policy",
            || store.create(&key, EntryKind::Key),
            None,
        )
        .unwrap_err();
    assert!(
        matches!(&err, PrivilegeError::AccessDenied { path, .. } if path.starts_with("HKLM")),
        "{err}"
    );
}

#[test]
fn type_mismatch_is_reported() {
    let store = store(MemoryRegistry::new());
    let err = store
        .set(
            &StorePath::parse(r"HKCU:\Software\App"),
            "Size",
            &Value::Qword(5),
            ValueKind::Dword,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidType {
            expected: ValueKind::Dword,
            actual: ValueKind::Qword,
            ..
        }
    ));
}
