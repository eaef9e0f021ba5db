//! Domain-specific error types for the recovery engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`TemplateError`],
//! [`ResolveError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! RecoveryError
//! ├── Template(TemplateError) - loading and schema validation
//! ├── Resolve(ResolveError) - inheritance resolution
//! │   ├── Condition(ComparisonError) - broken selector or rule condition
//! │   └── Validation(ValidationError) - merged result rejected
//! ├── Store(StoreError) - registry and file backends
//! ├── Privilege(PrivilegeError) - admin dispatch and elevation
//! └── Prerequisite(PrerequisiteError) - template prerequisite probes
//! ```

use thiserror::Error;

pub use crate::store::StoreError;

/// Boxed error returned by caller-supplied operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for the recovery engine.
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// Template loading or schema error.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Inheritance resolution error.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// State store error.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// Privilege or elevation error.
    #[error("Privilege error: {0}")]
    Privilege(#[from] PrivilegeError),

    /// Prerequisite check error.
    #[error("Prerequisite error: {0}")]
    Prerequisite(#[from] PrerequisiteError),
}

/// Errors that arise from loading a template or inheritance document.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The document does not exist.
    #[error("template not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: String,
    },

    /// The document is structurally invalid (unbalanced brackets, truncated
    /// arrays, wrong field types).
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path of the document.
        path: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A required field is missing or blank.
    #[error("schema error: missing required field '{field}'")]
    Schema {
        /// Dotted path of the missing field (e.g. `metadata.name`).
        field: String,
    },

    /// The document exists but could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path of the document.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors from evaluating a selector or condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComparisonError {
    /// The `matches` operator was given an invalid regular expression.
    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// The field path does not name a machine context field.
    #[error("unknown context field '{field}'")]
    UnknownField {
        /// The unrecognised field path.
        field: String,
    },
}

/// Reasons a resolved configuration is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Dotted path of the field.
        field: String,
    },

    /// A restore entry names a backup entry that does not exist.
    #[error("restore {kind} entry '{name}' has no matching backup entry")]
    BrokenPairing {
        /// Entry kind (`registry`, `files`, `applications`).
        kind: String,
        /// The dangling `name`.
        name: String,
    },

    /// A `${...}` placeholder could not be resolved from the machine context.
    #[error("unresolved placeholder '{placeholder}' at {field}")]
    UnresolvedPlaceholder {
        /// Document path holding the placeholder.
        field: String,
        /// The placeholder text.
        placeholder: String,
    },

    /// A registry entry's path does not start with a recognised hive.
    #[error("registry entry '{entry}' has unrecognised root in '{path}'")]
    InvalidRegistryRoot {
        /// Entry name.
        entry: String,
        /// The offending key path.
        path: String,
    },

    /// A registry value cannot be mapped onto a typed value.
    #[error("registry entry '{entry}' value '{value}': {reason}")]
    InvalidValue {
        /// Entry name.
        entry: String,
        /// Value name.
        value: String,
        /// Why the data was rejected.
        reason: String,
    },
}

/// Errors raised by the inheritance resolution engine.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A selector or condition could not be evaluated.
    #[error("{scope}: condition on '{field}' failed: {source}")]
    Condition {
        /// Owner of the condition (e.g. `machine configuration 'laptop'`).
        scope: String,
        /// Context field being compared.
        field: String,
        /// Underlying comparison error.
        source: ComparisonError,
    },

    /// An inheritance rule could not be applied at its path.
    #[error("inheritance rule '{rule}' cannot apply at '{path}': {reason}")]
    Rule {
        /// Rule name.
        rule: String,
        /// Document path.
        path: String,
        /// Why the path could not be applied.
        reason: String,
    },

    /// A fragment or the merged document has the wrong shape.
    #[error("{scope} is malformed: {reason}")]
    Fragment {
        /// Owner of the fragment.
        scope: String,
        /// Shape problem.
        reason: String,
    },

    /// The merged configuration failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors from privilege-aware dispatch.
#[derive(Error, Debug)]
pub enum PrivilegeError {
    /// An admin operation ran unelevated with no fallback.
    #[error("operation '{operation}' requires administrator privileges and has no fallback")]
    AdminRequired {
        /// Operation description.
        operation: String,
    },

    /// Elevation was required but prompting was disabled or refused.
    #[error("operation '{operation}' requires elevation")]
    ElevationRequired {
        /// Operation description.
        operation: String,
    },

    /// The state store refused access and no fallback was provided.
    #[error("operation '{operation}' was denied access to '{path}'")]
    AccessDenied {
        /// Operation description.
        operation: String,
        /// Path the store refused.
        path: String,
    },

    /// A state store error other than access denial.
    #[error("operation '{operation}' failed: {source}")]
    Store {
        /// Operation description.
        operation: String,
        /// Underlying store error.
        source: StoreError,
    },

    /// The caller-supplied operation failed.
    #[error("operation '{operation}' failed: {source}")]
    OperationFailed {
        /// Operation description.
        operation: String,
        /// Error returned by the operation.
        source: BoxError,
    },
}

/// Errors from evaluating template prerequisites.
#[derive(Error, Debug)]
pub enum PrerequisiteError {
    /// A prerequisite with `on_missing = fail` was not satisfied.
    #[error("prerequisite '{name}' failed: expected {expected}, got {actual}")]
    Failed {
        /// Prerequisite name.
        name: String,
        /// What the probe should have produced.
        expected: String,
        /// What it produced.
        actual: String,
    },

    /// The probe could not be run.
    #[error("prerequisite '{name}' probe could not run: {source}")]
    Probe {
        /// Prerequisite name.
        name: String,
        /// Underlying error.
        source: BoxError,
    },

    /// `expected_output` is not a valid pattern.
    #[error("prerequisite '{name}': {source}")]
    Comparison {
        /// Prerequisite name.
        name: String,
        /// Underlying comparison error.
        source: ComparisonError,
    },
}
