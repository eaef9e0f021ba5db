//! Filesystem-backed state store.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{EntryKind, StateStore, StoreData, StoreError, StorePath, Value, ValueKind};

/// File-like backend: paths are filesystem paths and values are byte content.
///
/// Only [`Value::Binary`] is accepted by `set`, so `get` returns exactly
/// what was written.
///
/// A non-empty `name` addresses a child of the directory at `path`; an
/// empty name addresses `path` itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl FileStore {
    fn file_path<'a>(path: &'a StorePath, operation: &str) -> Result<&'a Path, StoreError> {
        match path {
            StorePath::File(p) => Ok(p),
            StorePath::Registry(_) => Err(StoreError::Unsupported {
                backend: "file",
                operation: operation.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn target(path: &Path, name: Option<&str>) -> PathBuf {
        match name {
            Some(name) if !name.is_empty() => path.join(name),
            _ => path.to_path_buf(),
        }
    }

    fn read_file(path: &Path) -> Result<Value, StoreError> {
        fs::read(path)
            .map(Value::Binary)
            .map_err(|e| StoreError::from_io(path.display().to_string(), e))
    }

    fn read_dir(path: &Path) -> Result<BTreeMap<String, Value>, StoreError> {
        let io_err = |e| StoreError::from_io(path.display().to_string(), e);
        let mut values = BTreeMap::new();
        for entry in fs::read_dir(path).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let child = entry.path();
            if child.is_file() {
                values.insert(
                    entry.file_name().to_string_lossy().into_owned(),
                    Self::read_file(&child)?,
                );
            }
        }
        Ok(values)
    }
}

impl StateStore for FileStore {
    fn exists(&self, path: &StorePath) -> bool {
        matches!(path, StorePath::File(p) if p.exists())
    }

    fn get(&self, path: &StorePath, name: Option<&str>) -> Result<StoreData, StoreError> {
        let target = Self::target(Self::file_path(path, "get")?, name);
        if target.is_dir() {
            Self::read_dir(&target).map(StoreData::Values)
        } else {
            Self::read_file(&target).map(StoreData::Value)
        }
    }

    fn set(
        &self,
        path: &StorePath,
        name: &str,
        value: &Value,
        kind: ValueKind,
    ) -> Result<(), StoreError> {
        let target = Self::target(Self::file_path(path, "set")?, Some(name));
        let display = target.display().to_string();
        super::check_kind(&display, value, kind)?;
        let Value::Binary(bytes) = value else {
            return Err(StoreError::InvalidType {
                path: display,
                expected: ValueKind::Binary,
                actual: kind,
            });
        };

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::from_io(parent.display().to_string(), e))?;
        }
        fs::write(&target, bytes).map_err(|e| StoreError::from_io(display, e))
    }

    fn create(&self, path: &StorePath, kind: EntryKind) -> Result<(), StoreError> {
        let target = Self::file_path(path, "create")?;
        let display = target.display().to_string();
        if target.exists() {
            return Err(StoreError::AlreadyExists { path: display });
        }
        match kind {
            EntryKind::Directory => {
                fs::create_dir_all(target).map_err(|e| StoreError::from_io(display, e))
            }
            EntryKind::File => {
                if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .map_err(|e| StoreError::from_io(parent.display().to_string(), e))?;
                }
                fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(target)
                    .map(drop)
                    .map_err(|e| StoreError::from_io(display, e))
            }
            EntryKind::Key => Err(StoreError::Unsupported {
                backend: "file",
                operation: "create a key at".to_string(),
                path: display,
            }),
        }
    }

    fn remove(&self, path: &StorePath, recursive: bool) -> Result<(), StoreError> {
        let target = Self::file_path(path, "remove")?;
        let display = target.display().to_string();
        let meta =
            fs::symlink_metadata(target).map_err(|e| StoreError::from_io(display.clone(), e))?;
        let result = if !meta.is_dir() {
            fs::remove_file(target)
        } else if recursive {
            fs::remove_dir_all(target)
        } else {
            fs::remove_dir(target)
        };
        result.map_err(|e| StoreError::from_io(display, e))
    }
}
