//! Machine-aware configuration backup and restore engine.
//!
//! A [`config::Template`] says what to back up and restore. The
//! [`engine`] resolves it against the executing machine's
//! [`context::MachineContext`], layering machine configurations,
//! inheritance rules and conditional sections into one
//! [`engine::ResolvedConfiguration`].
//!
//! - **[`config`]**: template and inheritance documents, loading, validation
//! - **[`engine`]**: selectors, merge policy, placeholders, resolution
//! - **[`store`]**: registry and file backends behind one `StateStore` trait
//! - **[`privilege`]**: elevation detection, classification, degraded fallbacks
//! - **[`commands`]**: subcommand orchestration for the `recovery` binary
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod prerequisites;
pub mod privilege;
pub mod store;
