//! Template and inheritance document loading.
//!
//! Documents are JSON or TOML, chosen by file extension. Structurally
//! invalid input is always a [`TemplateError::Parse`]; a partially parsed
//! document is never returned.
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::inheritance::InheritanceConfig;
use super::template::Template;
use super::validation;
use crate::error::TemplateError;

/// Serialized document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON (`serde_json`).
    Json,
    /// TOML (`toml`).
    Toml,
}

impl Format {
    /// Format implied by a path's extension; anything but `.toml` is JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }

    fn is_document(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("toml"))
    }
}

/// Parse `content` as `T` in the given format.
///
/// # Errors
///
/// Returns [`TemplateError::Parse`] with `origin` as the path.
pub fn parse_document<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &str,
) -> Result<T, TemplateError> {
    let parse_err = |message: String| TemplateError::Parse {
        path: origin.to_string(),
        message,
    };
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.message().to_string())),
    }
}

/// Read and parse a document.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`], [`TemplateError::Io`] or
/// [`TemplateError::Parse`].
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, TemplateError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(TemplateError::NotFound { path: display });
    }
    let content = fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: display.clone(),
        source,
    })?;
    parse_document(&content, Format::from_path(path), &display)
}

/// Load a template and validate its schema.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`], [`TemplateError::Parse`] or
/// [`TemplateError::Schema`]; all are fatal to the template.
pub fn load_template(path: &Path) -> Result<Template, TemplateError> {
    let template: Template = load_document(path)?;
    validation::validate_schema(&template)?;
    tracing::debug!(
        "loaded template '{}' from {}",
        template.metadata.name,
        path.display()
    );
    Ok(template)
}

/// Load an inheritance document.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`], [`TemplateError::Parse`] or
/// [`TemplateError::Schema`] when a machine configuration, rule or section
/// has a blank name.
pub fn load_inheritance(path: &Path) -> Result<InheritanceConfig, TemplateError> {
    let config: InheritanceConfig = load_document(path)?;
    let names = config
        .machine_configurations
        .iter()
        .map(|c| ("machine_configurations", c.name.as_str()))
        .chain(
            config
                .inheritance_rules
                .iter()
                .map(|r| ("inheritance_rules", r.name.as_str())),
        )
        .chain(
            config
                .conditional_sections
                .iter()
                .map(|s| ("conditional_sections", s.name.as_str())),
        );
    for (list, name) in names {
        if name.trim().is_empty() {
            return Err(TemplateError::Schema {
                field: format!("{list}.name"),
            });
        }
    }
    Ok(config)
}

/// Template documents directly inside `dir`, sorted by path.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`] or [`TemplateError::Io`] if the
/// directory cannot be read.
pub fn discover_templates(dir: &Path) -> Result<Vec<PathBuf>, TemplateError> {
    let display = dir.display().to_string();
    let entries = fs::read_dir(dir).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            TemplateError::NotFound {
                path: display.clone(),
            }
        } else {
            TemplateError::Io {
                path: display.clone(),
                source,
            }
        }
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && Format::is_document(path))
        .collect();
    paths.sort();
    Ok(paths)
}
