//! Selector and condition evaluation against a [`MachineContext`].
use std::collections::BTreeMap;

use regex::Regex;

use crate::config::{ComparisonOperator, Condition, Expectation, MachineConfiguration};
use crate::context::MachineContext;
use crate::error::{ComparisonError, ResolveError};

/// Compare `actual` (left-hand side) with `expected` using `operator`.
///
/// For [`ComparisonOperator::Matches`], `expected` is a regular expression
/// searched for in `actual`.
///
/// # Errors
///
/// Returns [`ComparisonError::InvalidRegex`] if `expected` does not compile.
///
/// # Examples
///
/// ```
/// use recovery_cli::config::ComparisonOperator;
/// use recovery_cli::engine::selector::compare;
///
/// assert!(compare("LAPTOP-01", "^laptop", ComparisonOperator::Matches).is_ok_and(|m| !m));
/// assert!(compare("LAPTOP-01", "(?i)^laptop", ComparisonOperator::Matches).is_ok_and(|m| m));
/// assert!(compare("x", "(", ComparisonOperator::Matches).is_err());
/// ```
pub fn compare(
    actual: &str,
    expected: &str,
    operator: ComparisonOperator,
) -> Result<bool, ComparisonError> {
    match operator {
        ComparisonOperator::Equals => Ok(actual == expected),
        ComparisonOperator::EqualsCi => Ok(actual.to_lowercase() == expected.to_lowercase()),
        ComparisonOperator::Contains => Ok(actual.contains(expected)),
        ComparisonOperator::Matches => Regex::new(expected)
            .map(|re| re.is_match(actual))
            .map_err(|e| ComparisonError::InvalidRegex {
                pattern: expected.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Evaluate one field comparison. A field with no value never matches, but
/// the expected value is still checked so a bad regex is never masked.
fn holds(
    ctx: &MachineContext,
    field: &str,
    operator: ComparisonOperator,
    expected: &str,
) -> Result<bool, ComparisonError> {
    let actual = ctx.field(field)?;
    if operator == ComparisonOperator::Matches {
        // Surface pattern errors even when the field is absent.
        compare("", expected, operator)?;
    }
    actual.map_or(Ok(false), |actual| compare(&actual, expected, operator))
}

/// AND-reduce `(field, operator, expected)` triples.
///
/// Every comparison is evaluated, even after one fails, so that any
/// comparison error surfaces regardless of declaration order.
fn all_hold<'a, I>(ctx: &MachineContext, comparisons: I) -> Result<bool, (String, ComparisonError)>
where
    I: IntoIterator<Item = (&'a str, ComparisonOperator, &'a str)>,
{
    let mut all = true;
    for (field, operator, expected) in comparisons {
        all &= holds(ctx, field, operator, expected).map_err(|e| (field.to_string(), e))?;
    }
    Ok(all)
}

fn selector_triples(
    selectors: &BTreeMap<String, Expectation>,
) -> impl Iterator<Item = (&str, ComparisonOperator, &str)> {
    selectors
        .iter()
        .map(|(field, e)| (field.as_str(), e.operator, e.value.as_str()))
}

/// Whether every selector holds for `ctx`. Empty selectors always match.
///
/// # Errors
///
/// Returns the first [`ComparisonError`] encountered.
pub fn match_selectors(
    selectors: &BTreeMap<String, Expectation>,
    ctx: &MachineContext,
) -> Result<bool, ComparisonError> {
    all_hold(ctx, selector_triples(selectors)).map_err(|(_, e)| e)
}

/// Whether every condition holds for `ctx`, attributing failures to `scope`.
///
/// # Errors
///
/// Returns [`ResolveError::Condition`] naming the scope and failing field.
pub fn conditions_hold(
    scope: &str,
    conditions: &[Condition],
    ctx: &MachineContext,
) -> Result<bool, ResolveError> {
    all_hold(
        ctx,
        conditions
            .iter()
            .map(|c| (c.field.as_str(), c.operator, c.value.as_str())),
    )
    .map_err(|(field, source)| ResolveError::Condition {
        scope: scope.to_string(),
        field,
        source,
    })
}

/// Machine configurations whose selectors all hold, in declaration order.
///
/// # Errors
///
/// Returns [`ResolveError::Condition`] if any selector cannot be evaluated;
/// a broken selector is never treated as a non-match.
pub fn applicable_configurations<'a>(
    configs: &'a [MachineConfiguration],
    ctx: &MachineContext,
) -> Result<Vec<&'a MachineConfiguration>, ResolveError> {
    let mut applicable = Vec::new();
    for config in configs {
        let matched = all_hold(ctx, selector_triples(&config.selectors)).map_err(
            |(field, source)| ResolveError::Condition {
                scope: format!("machine configuration '{}'", config.name),
                field,
                source,
            },
        )?;
        if matched {
            applicable.push(config);
        }
    }
    Ok(applicable)
}
