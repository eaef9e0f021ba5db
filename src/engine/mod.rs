//! Inheritance resolution engine.
//!
//! [`resolve`] combines a [`Template`] with machine configurations,
//! inheritance rules and conditional sections, evaluated against a
//! [`MachineContext`], into one [`ResolvedConfiguration`]:
//!
//! 1. the template's backup/restore sections form the baseline
//! 2. applicable machine configurations merge over it in declaration order
//! 3. matching inheritance rules apply their action at each path
//! 4. conditional sections whose conditions hold merge over the result
//! 5. `${...}` placeholders expand from the context
//! 6. the result is validated at the requested [`ValidationLevel`]
//!
//! Resolution is pure: no I/O, no shared state, and identical inputs yield
//! equal outputs. It fails fast on the first error.
pub mod merge;
pub mod placeholder;
pub mod selector;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use sha2::{Digest, Sha256};

use crate::config::validation::{
    self, ConfigValidator, PairingValidator, PlaceholderValidator, RegistryRootValidator,
};
use crate::config::{
    ConditionalSection, InheritanceConfig, InheritanceRule, MachineConfiguration, Metadata,
    Prerequisite, RuleAction, RuleMode, Section, Template, ValidationLevel, ValidationWarning,
};
use crate::context::MachineContext;
use crate::error::{ResolveError, ValidationError};

/// Options for one resolution call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Validation level for the merged result.
    pub validation_level: ValidationLevel,
    /// Rule combination mode.
    pub rule_mode: RuleMode,
}

impl From<&InheritanceConfig> for ResolveOptions {
    fn from(config: &InheritanceConfig) -> Self {
        Self {
            validation_level: config.validation_level,
            rule_mode: config.rule_mode,
        }
    }
}

/// Names of the layers that contributed to a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLayers {
    /// Applicable machine configurations, in merge order.
    pub machine_configurations: Vec<String>,
    /// Inheritance rules that applied, in evaluation order.
    pub inheritance_rules: Vec<String>,
    /// Conditional sections that merged, in evaluation order.
    pub conditional_sections: Vec<String>,
}

/// The terminal value of the pipeline: no outstanding selectors or
/// conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfiguration {
    /// Template metadata.
    pub metadata: Metadata,
    /// Template prerequisites.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<Prerequisite>,
    /// Resolved backup section.
    pub backup: Section,
    /// Resolved restore section.
    pub restore: Section,
    /// Contributing layers.
    pub applied: AppliedLayers,
    /// Findings reported as warnings at the `moderate` level.
    #[serde(skip)]
    pub warnings: Vec<ValidationWarning>,
}

impl ResolvedConfiguration {
    /// Hex SHA-256 of the canonical JSON form.
    ///
    /// Object keys serialize in sorted order, so equal configurations
    /// always share a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Fragment`] if the configuration cannot be
    /// serialized.
    pub fn fingerprint(&self) -> Result<String, ResolveError> {
        let canonical = serde_json::to_vec(self).map_err(|e| ResolveError::Fragment {
            scope: format!("resolved configuration '{}'", self.metadata.name),
            reason: e.to_string(),
        })?;
        let digest = Sha256::digest(&canonical);
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    }
}

const SECTION_KEYS: [&str; 2] = ["backup", "restore"];
const ENTRY_KEYS: [&str; 3] = ["registry", "files", "applications"];

/// Normalise a fragment to `{backup?, restore?}`.
///
/// A fragment holding only entry lists at top level is taken as a backup
/// section, like a template document. `null` is an empty fragment.
fn normalize_fragment(scope: &str, fragment: &Json) -> Result<Json, ResolveError> {
    let malformed = |reason: String| ResolveError::Fragment {
        scope: scope.to_string(),
        reason,
    };
    let map = match fragment {
        Json::Null => return Ok(Json::Object(Map::new())),
        Json::Object(map) => map,
        _ => return Err(malformed("expected an object".to_string())),
    };

    if let Some(key) = map
        .keys()
        .find(|k| !SECTION_KEYS.contains(&k.as_str()) && !ENTRY_KEYS.contains(&k.as_str()))
    {
        return Err(malformed(format!("unexpected key '{key}'")));
    }
    let has_sections = map.keys().any(|k| SECTION_KEYS.contains(&k.as_str()));
    let has_entries = map.keys().any(|k| ENTRY_KEYS.contains(&k.as_str()));
    if has_sections && has_entries {
        return Err(malformed(
            "mixes top-level entry lists with backup/restore sections".to_string(),
        ));
    }
    if has_entries {
        let mut wrapped = Map::new();
        wrapped.insert("backup".to_string(), fragment.clone());
        return Ok(Json::Object(wrapped));
    }
    Ok(fragment.clone())
}

fn baseline(template: &Template) -> Result<Json, ResolveError> {
    let to_json = |section: &Section| {
        serde_json::to_value(section).map_err(|e| ResolveError::Fragment {
            scope: format!("template '{}'", template.metadata.name),
            reason: e.to_string(),
        })
    };
    let mut doc = Map::new();
    doc.insert("backup".to_string(), to_json(&template.backup)?);
    doc.insert("restore".to_string(), to_json(&template.restore)?);
    Ok(Json::Object(doc))
}

/// Apply one rule at every path, skipping paths in `claimed` (first-match
/// mode) and recording the paths touched.
fn apply_rule(
    doc: &mut Json,
    rule: &InheritanceRule,
    claimed: &mut BTreeSet<String>,
    mode: RuleMode,
) -> Result<bool, ResolveError> {
    let rule_err = |path: &str, reason: String| ResolveError::Rule {
        rule: rule.name.clone(),
        path: path.to_string(),
        reason,
    };
    let mut touched = false;
    for path in &rule.paths {
        if mode == RuleMode::FirstMatch && claimed.contains(path) {
            tracing::debug!("rule '{}' skips '{path}': claimed by an earlier rule", rule.name);
            continue;
        }
        let segments = merge::segments(path);
        if segments.first().is_none_or(|root| !SECTION_KEYS.contains(root)) {
            return Err(rule_err(path, "path must start with 'backup' or 'restore'".to_string()));
        }

        if rule.action == RuleAction::Skip {
            merge::remove_node(doc, &segments).map_err(|reason| rule_err(path, reason))?;
        } else {
            let value = rule.value.as_ref().ok_or_else(|| {
                rule_err(path, format!("action '{}' requires a value", rule.action))
            })?;
            let node = merge::node_mut(doc, &segments).map_err(|reason| rule_err(path, reason))?;
            match rule.action {
                RuleAction::Override => *node = value.clone(),
                RuleAction::Merge => merge::merge(node, value),
                RuleAction::MergeAppend => merge::merge_append(node, value),
                RuleAction::Skip => {}
            }
        }
        claimed.insert(path.clone());
        touched = true;
    }
    Ok(touched)
}

fn section_from(doc: &mut Json, key: &str) -> Result<Section, ResolveError> {
    let value = doc
        .as_object_mut()
        .and_then(|map| map.remove(key))
        .unwrap_or(Json::Null);
    if value.is_null() {
        return Ok(Section::default());
    }
    serde_json::from_value(value).map_err(|e| ResolveError::Fragment {
        scope: format!("resolved {key} section"),
        reason: e.to_string(),
    })
}

/// Resolve `template` for the machine described by `context`.
///
/// # Errors
///
/// - [`ResolveError::Condition`] if any selector or condition cannot be
///   evaluated (a broken condition never counts as false)
/// - [`ResolveError::Rule`] if a rule cannot apply at one of its paths
/// - [`ResolveError::Fragment`] if an override or the merged result has the
///   wrong shape
/// - [`ResolveError::Validation`] if the result fails validation
pub fn resolve(
    template: &Template,
    machine_configs: &[MachineConfiguration],
    rules: &[InheritanceRule],
    sections: &[ConditionalSection],
    context: &MachineContext,
    options: &ResolveOptions,
) -> Result<ResolvedConfiguration, ResolveError> {
    let name = &template.metadata.name;
    let mut doc = baseline(template)?;
    let mut applied = AppliedLayers::default();

    for config in selector::applicable_configurations(machine_configs, context)? {
        let scope = format!("machine configuration '{}'", config.name);
        merge::merge(&mut doc, &normalize_fragment(&scope, &config.overrides)?);
        tracing::debug!("{name}: applied {scope}");
        applied.machine_configurations.push(config.name.clone());
    }

    let mut claimed = BTreeSet::new();
    for rule in rules {
        let scope = format!("inheritance rule '{}'", rule.name);
        if selector::conditions_hold(&scope, &rule.conditions, context)?
            && apply_rule(&mut doc, rule, &mut claimed, options.rule_mode)?
        {
            tracing::debug!("{name}: applied {scope} ({})", rule.action);
            applied.inheritance_rules.push(rule.name.clone());
        }
    }

    for section in sections {
        let scope = format!("conditional section '{}'", section.name);
        if selector::conditions_hold(&scope, &section.conditions, context)? {
            merge::merge(&mut doc, &normalize_fragment(&scope, &section.fragment)?);
            tracing::debug!("{name}: applied {scope}");
            applied.conditional_sections.push(section.name.clone());
        }
    }

    let unresolved = placeholder::expand(&mut doc, context);
    let backup = section_from(&mut doc, "backup")?;
    let restore = section_from(&mut doc, "restore")?;

    if let Some(field) = validation::missing_field(&template.metadata, &backup, &restore) {
        return Err(ValidationError::MissingField { field }.into());
    }
    validation::check_values(&backup, &restore)?;
    let pairing = PairingValidator::new(&backup, &restore);
    let roots = RegistryRootValidator::new(&backup, &restore);
    let placeholders = PlaceholderValidator::new(&unresolved);
    let validators: [&dyn ConfigValidator; 3] = [&pairing, &roots, &placeholders];
    let warnings = validation::apply_level(options.validation_level, &validators)?;
    for warning in &warnings {
        tracing::warn!("{name}: {warning}");
    }

    Ok(ResolvedConfiguration {
        metadata: template.metadata.clone(),
        prerequisites: template.prerequisites.clone(),
        backup,
        restore,
        applied,
        warnings,
    })
}

/// [`resolve`] with every layer taken from an inheritance document.
///
/// `level` overrides the document's validation level when given.
///
/// # Errors
///
/// See [`resolve`].
pub fn resolve_with(
    template: &Template,
    inheritance: &InheritanceConfig,
    context: &MachineContext,
    level: Option<ValidationLevel>,
) -> Result<ResolvedConfiguration, ResolveError> {
    let mut options = ResolveOptions::from(inheritance);
    if let Some(level) = level {
        options.validation_level = level;
    }
    resolve(
        template,
        &inheritance.machine_configurations,
        &inheritance.inheritance_rules,
        &inheritance.conditional_sections,
        context,
        &options,
    )
}
