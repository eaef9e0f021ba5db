//! Template and inheritance documents.
//!
//! - [`template`]: what to back up and restore
//! - [`inheritance`]: machine configurations, rules and conditional sections
//! - [`loader`]: JSON/TOML loading with parse/schema errors kept distinct
//! - [`validation`]: schema checks and level-dependent validators
pub mod inheritance;
pub mod loader;
pub mod template;
pub mod validation;

pub use inheritance::{
    ComparisonOperator, Condition, ConditionalSection, Expectation, InheritanceConfig,
    InheritanceRule, MachineConfiguration, RuleAction, RuleMode, ValidationLevel,
};
pub use loader::{discover_templates, load_inheritance, load_template};
pub use template::{
    ApplicationEntry, FileEntry, FileKind, Metadata, OnMissing, Prerequisite, PrerequisiteKind,
    RegistryEntry, Section, Template,
};
pub use validation::{ValidationWarning, validate_schema};
