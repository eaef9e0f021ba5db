//! In-memory hierarchical registry backend.
//!
//! Portable stand-in for the Windows registry: used as the registry backend
//! on non-Windows hosts and as the injectable test double everywhere.
//! Key names compare case-insensitively, as on Windows.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use super::{EntryKind, StateStore, StoreData, StoreError, StorePath, Value, ValueKind};
use super::{check_kind, path::Hive, path::RegistryPath};

/// A single registry key with its values and subkeys.
#[derive(Debug, Default, Clone)]
struct Key {
    values: BTreeMap<String, Value>,
    /// Subkeys keyed by lowercase name.
    children: BTreeMap<String, Self>,
}

impl Key {
    fn find(&self, segments: &[String]) -> Option<&Self> {
        segments.iter().try_fold(self, |key, segment| {
            key.children.get(&segment.to_lowercase())
        })
    }

    fn find_mut(&mut self, segments: &[String]) -> Option<&mut Self> {
        segments.iter().try_fold(self, |key, segment| {
            key.children.get_mut(&segment.to_lowercase())
        })
    }

    fn find_or_create(&mut self, segments: &[String]) -> &mut Self {
        segments.iter().fold(self, |key, segment| {
            key.children.entry(segment.to_lowercase()).or_default()
        })
    }
}

/// Thread-safe in-memory registry.
///
/// Hives can be marked read-only with [`deny_writes`](Self::deny_writes) to
/// model an unprivileged session writing machine-wide keys.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    hives: RwLock<BTreeMap<Hive, Key>>,
    read_only: BTreeSet<Hive>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes under `hive` with [`StoreError::AccessDenied`].
    #[must_use]
    pub fn deny_writes(mut self, hive: Hive) -> Self {
        self.read_only.insert(hive);
        self
    }

    fn registry_path<'a>(path: &'a StorePath, operation: &str) -> Result<&'a RegistryPath, StoreError> {
        match path {
            StorePath::Registry(key) => Ok(key),
            StorePath::File(_) => Err(StoreError::Unsupported {
                backend: "registry",
                operation: operation.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn check_writable(&self, key: &RegistryPath) -> Result<(), StoreError> {
        if self.read_only.contains(&key.hive()) {
            Err(StoreError::AccessDenied {
                path: key.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<Hive, Key>> {
        self.hives
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<Hive, Key>> {
        self.hives
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl StateStore for MemoryRegistry {
    fn exists(&self, path: &StorePath) -> bool {
        let StorePath::Registry(key) = path else {
            return false;
        };
        // Hive roots always exist.
        key.is_root()
            || self
                .read()
                .get(&key.hive())
                .and_then(|root| root.find(key.segments()))
                .is_some()
    }

    fn get(&self, path: &StorePath, name: Option<&str>) -> Result<StoreData, StoreError> {
        let key = Self::registry_path(path, "get")?;
        let hives = self.read();
        let not_found = || StoreError::NotFound {
            path: key.to_string(),
        };
        let node = match hives.get(&key.hive()) {
            Some(root) => root.find(key.segments()).ok_or_else(not_found)?,
            None if key.is_root() => return Ok(StoreData::Values(BTreeMap::new())),
            None => return Err(not_found()),
        };

        match name {
            None => Ok(StoreData::Values(node.values.clone())),
            Some(name) => node
                .values
                .get(name)
                .cloned()
                .map(StoreData::Value)
                .ok_or_else(|| StoreError::NotFound {
                    path: format!("{key}\\{name}"),
                }),
        }
    }

    fn set(
        &self,
        path: &StorePath,
        name: &str,
        value: &Value,
        kind: ValueKind,
    ) -> Result<(), StoreError> {
        let key = Self::registry_path(path, "set")?;
        check_kind(&format!("{key}\\{name}"), value, kind)?;
        self.check_writable(key)?;

        // Like `New-Item -Force`: missing keys along the path are created.
        let mut hives = self.write();
        hives
            .entry(key.hive())
            .or_default()
            .find_or_create(key.segments())
            .values
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn create(&self, path: &StorePath, kind: EntryKind) -> Result<(), StoreError> {
        let key = Self::registry_path(path, "create")?;
        if kind != EntryKind::Key {
            return Err(StoreError::Unsupported {
                backend: "registry",
                operation: format!("create a {kind} at"),
                path: key.to_string(),
            });
        }
        if self.exists(path) {
            return Err(StoreError::AlreadyExists {
                path: key.to_string(),
            });
        }
        self.check_writable(key)?;

        self.write()
            .entry(key.hive())
            .or_default()
            .find_or_create(key.segments());
        Ok(())
    }

    fn remove(&self, path: &StorePath, recursive: bool) -> Result<(), StoreError> {
        let key = Self::registry_path(path, "remove")?;
        let Some((parent, last)) = key.split_last() else {
            return Err(StoreError::AccessDenied {
                path: key.to_string(),
            });
        };
        self.check_writable(key)?;

        let mut hives = self.write();
        let not_found = || StoreError::NotFound {
            path: key.to_string(),
        };
        let parent_node = hives
            .get_mut(&key.hive())
            .and_then(|root| root.find_mut(parent.segments()))
            .ok_or_else(not_found)?;
        let child_name = last.to_lowercase();
        let child = parent_node.children.get(&child_name).ok_or_else(not_found)?;
        if !recursive && !child.children.is_empty() {
            return Err(StoreError::NotEmpty {
                path: key.to_string(),
            });
        }
        parent_node.children.remove(&child_name);
        Ok(())
    }
}
