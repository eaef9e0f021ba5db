//! Inheritance documents: machine configurations, inheritance rules and
//! conditional sections layered over a template.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// How aggressively a resolved configuration is rejected.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Schema and value typing only.
    Minimal,
    /// Also report broken pairings, unresolved placeholders and unknown
    /// registry roots as warnings.
    #[default]
    Moderate,
    /// Reject the configuration on any of the moderate findings.
    Strict,
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimal => f.write_str("minimal"),
            Self::Moderate => f.write_str("moderate"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

/// How multiple matching inheritance rules combine on the same path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleMode {
    /// Every matching rule applies in order; the last one wins on a path.
    #[default]
    Cumulative,
    /// Only the first matching rule touches a given path.
    #[serde(alias = "first_match")]
    FirstMatch,
}

/// Comparison used by selectors and conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    /// Exact string equality.
    #[default]
    #[serde(alias = "eq")]
    Equals,
    /// Case-insensitive equality.
    #[serde(alias = "equals-ci", alias = "ieq")]
    EqualsCi,
    /// Substring test.
    Contains,
    /// Regular-expression match.
    #[serde(alias = "match", alias = "regex")]
    Matches,
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals => f.write_str("equals"),
            Self::EqualsCi => f.write_str("equals_ci"),
            Self::Contains => f.write_str("contains"),
            Self::Matches => f.write_str("matches"),
        }
    }
}

/// Scalar accepted wherever an expected value is written, so
/// `"elevated": true` and `"elevated": "true"` are equivalent.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Flag(bool),
    Int(i64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(s) => s,
            Scalar::Flag(b) => b.to_string(),
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(x) => x.to_string(),
        }
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FullExpectation {
    #[serde(default, alias = "op")]
    operator: ComparisonOperator,
    value: Scalar,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpectationRepr {
    Full(FullExpectation),
    Shorthand(Scalar),
}

/// Expected value for one selector field.
///
/// Written either in full (`{"operator": "matches", "value": "^LAP"}`, with
/// `op` accepted for `operator`) or as a bare value meaning `equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ExpectationRepr")]
pub struct Expectation {
    /// Comparison operator.
    pub operator: ComparisonOperator,
    /// Expected value (right-hand side).
    pub value: String,
}

impl Expectation {
    /// Expectation with an explicit operator.
    #[must_use]
    pub fn new(operator: ComparisonOperator, value: impl Into<String>) -> Self {
        Self {
            operator,
            value: value.into(),
        }
    }

    /// `equals` expectation.
    #[must_use]
    pub fn equals(value: impl Into<String>) -> Self {
        Self::new(ComparisonOperator::Equals, value)
    }
}

impl From<ExpectationRepr> for Expectation {
    fn from(repr: ExpectationRepr) -> Self {
        match repr {
            ExpectationRepr::Full(full) => Self::new(full.operator, full.value),
            ExpectationRepr::Shorthand(value) => Self::equals(value),
        }
    }
}

/// One field comparison in a rule or section condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Machine context field path.
    pub field: String,
    /// Comparison operator.
    #[serde(default, alias = "op")]
    pub operator: ComparisonOperator,
    /// Expected value.
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

impl Condition {
    /// Build a condition.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A named override bound to machine selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfiguration {
    /// Configuration name.
    pub name: String,
    /// Context field path to expectation; all must hold. Empty matches
    /// every machine.
    #[serde(default)]
    pub selectors: BTreeMap<String, Expectation>,
    /// Fragment with `backup` and/or `restore` sections merged over the
    /// baseline.
    #[serde(default)]
    pub overrides: serde_json::Value,
}

/// Action an inheritance rule performs at each of its paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleAction {
    /// Replace the value at the path.
    Override,
    /// Deep-merge the rule value into the path, the rule value winning.
    Merge,
    /// Append list items (merging named entries); objects merge.
    #[serde(alias = "merge_append", alias = "append")]
    MergeAppend,
    /// Remove the path from the resolved document.
    Skip,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => f.write_str("override"),
            Self::Merge => f.write_str("merge"),
            Self::MergeAppend => f.write_str("merge-append"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// Condition plus merge directive applied at document paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceRule {
    /// Rule name.
    pub name: String,
    /// All must hold for the rule to apply. Empty always applies.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// What to do at each path.
    pub action: RuleAction,
    /// Dot-separated document paths (`backup.registry.app-theme.values`);
    /// quote a segment that contains dots (`backup.files."app.settings"`).
    #[serde(default)]
    pub paths: Vec<String>,
    /// Payload for `override`, `merge` and `merge-append`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Fragment merged only when its conditions hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalSection {
    /// Section name.
    pub name: String,
    /// All must hold for the fragment to merge.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Fragment with `backup` and/or `restore` sections.
    #[serde(default)]
    pub fragment: serde_json::Value,
}

/// Everything layered over a template for one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InheritanceConfig {
    /// Validation level applied to the merged result.
    pub validation_level: ValidationLevel,
    /// Rule combination mode.
    pub rule_mode: RuleMode,
    /// Machine configurations in precedence order (later wins).
    pub machine_configurations: Vec<MachineConfiguration>,
    /// Inheritance rules in evaluation order.
    pub inheritance_rules: Vec<InheritanceRule>,
    /// Conditional sections in evaluation order.
    pub conditional_sections: Vec<ConditionalSection>,
}
