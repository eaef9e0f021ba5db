//! Typed error variants for state store operations.
//!
//! `NotFound` is recoverable (callers may treat it as "no data yet"), while
//! `AccessDenied` must be routed through the privilege model instead of being
//! retried.

use std::io;

use thiserror::Error;

use super::value::ValueKind;

/// Errors that arise from state store reads and writes.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The key, value, file, or directory does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// Path (and value name, when relevant) that was looked up.
        path: String,
    },

    /// The caller lacks permission for the operation.
    #[error("access denied: {path}")]
    AccessDenied {
        /// Path for which access was denied.
        path: String,
    },

    /// The value's type does not match the declared type, or the backend
    /// cannot store values of that type.
    #[error("invalid type for '{path}': expected {expected}, got {actual}")]
    InvalidType {
        /// Path being written.
        path: String,
        /// Declared type.
        expected: ValueKind,
        /// Type of the supplied value.
        actual: ValueKind,
    },

    /// The entry to create already exists.
    #[error("already exists: {path}")]
    AlreadyExists {
        /// Path that already exists.
        path: String,
    },

    /// A non-recursive removal targeted an entry with children.
    #[error("'{path}' has children; use a recursive removal")]
    NotEmpty {
        /// Path that still has children.
        path: String,
    },

    /// The backend cannot perform the operation for this kind of entry.
    #[error("{backend} backend cannot {operation} '{path}'")]
    Unsupported {
        /// Backend name (`registry` or `file`).
        backend: &'static str,
        /// Operation that was attempted.
        operation: String,
        /// Path that was addressed.
        path: String,
    },

    /// Any other I/O failure.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl StoreError {
    /// Map an [`io::Error`] onto the store taxonomy.
    #[must_use]
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::AccessDenied { path },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            io::ErrorKind::DirectoryNotEmpty => Self::NotEmpty { path },
            _ => Self::Io { path, source: err },
        }
    }

    /// Whether this is a recoverable [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is an [`StoreError::AccessDenied`] that must be escalated.
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let e = StoreError::NotFound {
            path: r"HKCU:\App\Theme".to_string(),
        };
        assert_eq!(e.to_string(), r"not found: HKCU:\App\Theme");
        assert!(e.is_not_found());
    }

    #[test]
    fn invalid_type_display() {
        let e = StoreError::InvalidType {
            path: r"HKCU:\App".to_string(),
            expected: ValueKind::Dword,
            actual: ValueKind::String,
        };
        assert!(e.to_string().contains("expected dword, got string"));
    }

    #[test]
    fn from_io_maps_kinds() {
        let denied = StoreError::from_io("/etc/shadow", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(denied.is_access_denied());

        let missing = StoreError::from_io("/nope", io::Error::from(io::ErrorKind::NotFound));
        assert!(missing.is_not_found());

        let other = StoreError::from_io("/x", io::Error::other("boom"));
        assert!(matches!(other, StoreError::Io { .. }));
    }

    #[test]
    fn store_error_converts_to_anyhow() {
        let e = StoreError::AlreadyExists {
            path: "/tmp".to_string(),
        };
        let _anyhow_err: anyhow::Error = e.into();
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn store_error_is_send_sync() {
        assert_send_sync::<StoreError>();
    }
}
