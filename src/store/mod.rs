//! Uniform state store over registry-like and file-like backends.
//!
//! Every backend implements the same [`StateStore`] contract
//! (`exists`/`get`/`set`/`create`/`remove`), so callers hold an injected
//! `Arc<dyn StateStore>` and never branch on the backend themselves.
//! [`Store`] routes each [`StorePath`] to the registry or file backend
//! based on the variant chosen when the path was parsed.
pub mod error;
pub mod file;
pub mod path;
pub mod registry;
pub mod value;
#[cfg(windows)]
pub mod windows;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use error::StoreError;
pub use file::FileStore;
pub use path::{Hive, RegistryPath, StorePath};
pub use registry::MemoryRegistry;
pub use value::{Value, ValueKind};

/// Kind of entry to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A registry key.
    Key,
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key => f.write_str("key"),
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
        }
    }
}

/// Data returned by [`StateStore::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreData {
    /// A single named value (or a file's content).
    Value(Value),
    /// Every named value at a path (registry key values, or the files in a
    /// directory keyed by file name).
    Values(BTreeMap<String, Value>),
}

impl StoreData {
    /// The single value, if this is [`StoreData::Value`].
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Values(_) => None,
        }
    }

    /// The value map, if this is [`StoreData::Values`].
    #[must_use]
    pub const fn as_values(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Values(values) => Some(values),
            Self::Value(_) => None,
        }
    }
}

/// Uniform interface over persistent key/value backends.
///
/// Implementations perform real I/O and do not serialize concurrent writers
/// to the same path; callers own their target paths for the duration of a
/// run.
pub trait StateStore: Send + Sync + fmt::Debug {
    /// Returns `true` if `path` exists.
    fn exists(&self, path: &StorePath) -> bool;

    /// Read the value `name` at `path`, or every named value at `path` when
    /// `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the path or value is missing.
    fn get(&self, path: &StorePath, name: Option<&str>) -> Result<StoreData, StoreError>;

    /// Write `value` as `name` at `path`, checking it against the declared
    /// `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidType`] when `value` does not match
    /// `kind`, or [`StoreError::AccessDenied`] when the write is refused.
    fn set(
        &self,
        path: &StorePath,
        name: &str,
        value: &Value,
        kind: ValueKind,
    ) -> Result<(), StoreError>;

    /// Create an entry of the given kind at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] or [`StoreError::AccessDenied`].
    fn create(&self, path: &StorePath, kind: EntryKind) -> Result<(), StoreError>;

    /// Remove the entry at `path`; `recursive` also removes children.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`], [`StoreError::NotEmpty`] or
    /// [`StoreError::AccessDenied`].
    fn remove(&self, path: &StorePath, recursive: bool) -> Result<(), StoreError>;

    /// Like [`get`](Self::get), surfacing a missing entry as `None`.
    ///
    /// # Errors
    ///
    /// Propagates every error except [`StoreError::NotFound`].
    fn get_optional(
        &self,
        path: &StorePath,
        name: Option<&str>,
    ) -> Result<Option<StoreData>, StoreError> {
        match self.get(path, name) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Reject a value whose kind differs from the declared kind.
pub(crate) fn check_kind(path: &str, value: &Value, kind: ValueKind) -> Result<(), StoreError> {
    if value.kind() == kind {
        Ok(())
    } else {
        Err(StoreError::InvalidType {
            path: path.to_string(),
            expected: kind,
            actual: value.kind(),
        })
    }
}

/// Routes each [`StorePath`] to the registry or file backend.
#[derive(Debug, Clone)]
pub struct Store {
    registry: Arc<dyn StateStore>,
    files: Arc<dyn StateStore>,
}

impl Store {
    /// Create a router over explicit backends (e.g. test doubles).
    #[must_use]
    pub fn new(registry: Arc<dyn StateStore>, files: Arc<dyn StateStore>) -> Self {
        Self { registry, files }
    }

    /// Router over the host's backends.
    ///
    /// Uses the native registry on Windows and an in-memory registry
    /// elsewhere; files always go to the real filesystem.
    #[must_use]
    pub fn system() -> Self {
        #[cfg(windows)]
        let registry: Arc<dyn StateStore> = Arc::new(windows::WindowsRegistry);
        #[cfg(not(windows))]
        let registry: Arc<dyn StateStore> = Arc::new(MemoryRegistry::new());
        Self::new(registry, Arc::new(FileStore))
    }

    fn backend(&self, path: &StorePath) -> &dyn StateStore {
        match path {
            StorePath::Registry(_) => self.registry.as_ref(),
            StorePath::File(_) => self.files.as_ref(),
        }
    }
}

impl StateStore for Store {
    fn exists(&self, path: &StorePath) -> bool {
        self.backend(path).exists(path)
    }

    fn get(&self, path: &StorePath, name: Option<&str>) -> Result<StoreData, StoreError> {
        self.backend(path).get(path, name)
    }

    fn set(
        &self,
        path: &StorePath,
        name: &str,
        value: &Value,
        kind: ValueKind,
    ) -> Result<(), StoreError> {
        tracing::debug!("set {path} [{name}] ({kind})");
        self.backend(path).set(path, name, value, kind)
    }

    fn create(&self, path: &StorePath, kind: EntryKind) -> Result<(), StoreError> {
        tracing::debug!("create {kind} {path}");
        self.backend(path).create(path, kind)
    }

    fn remove(&self, path: &StorePath, recursive: bool) -> Result<(), StoreError> {
        tracing::debug!("remove {path} (recursive: {recursive})");
        self.backend(path).remove(path, recursive)
    }
}
