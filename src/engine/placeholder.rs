//! `${...}` placeholder expansion from the machine context.
//!
//! `${hostname}` and `${env.USERPROFILE}` resolve context field paths;
//! `${env:USERPROFILE}` is accepted as a spelling of the latter. A
//! placeholder that does not resolve is left in place and reported.
use serde_json::Value;

use crate::context::MachineContext;

/// A placeholder left unresolved: `(document path, placeholder text)`.
pub type Unresolved = (String, String);

fn lookup(ctx: &MachineContext, expr: &str) -> Option<String> {
    let field = expr
        .strip_prefix("env:")
        .map_or_else(|| expr.trim().to_string(), |name| format!("env.{}", name.trim()));
    ctx.field(&field).ok().flatten()
}

/// Expand every placeholder in `text`, recording unresolved ones.
#[must_use]
pub fn expand_str(
    text: &str,
    ctx: &MachineContext,
    location: &str,
    unresolved: &mut Vec<Unresolved>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let (before, tail) = rest.split_at(start);
        out.push_str(before);
        let Some(end) = tail.find('}') else {
            // Unterminated: keep verbatim.
            out.push_str(tail);
            unresolved.push((location.to_string(), tail.to_string()));
            return out;
        };
        let (placeholder, after) = tail.split_at(end + 1);
        let expr = placeholder
            .get(2..placeholder.len() - 1)
            .unwrap_or_default();
        match lookup(ctx, expr) {
            Some(value) => out.push_str(&value),
            None => {
                out.push_str(placeholder);
                unresolved.push((location.to_string(), placeholder.to_string()));
            }
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn child_location(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Expand placeholders in every string value of `doc` (object keys are left
/// alone) and return the unresolved ones in document order.
pub fn expand(doc: &mut Value, ctx: &MachineContext) -> Vec<Unresolved> {
    let mut unresolved = Vec::new();
    expand_node(doc, ctx, "", &mut unresolved);
    unresolved
}

fn expand_node(node: &mut Value, ctx: &MachineContext, location: &str, out: &mut Vec<Unresolved>) {
    match node {
        Value::String(text) if text.contains("${") => {
            *text = expand_str(text, ctx, location, out);
        }
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                expand_node(child, ctx, &child_location(location, key), out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                // Named entries are addressed by name, like rule paths.
                let segment = item
                    .get("name")
                    .and_then(Value::as_str)
                    .map_or_else(|| i.to_string(), str::to_string);
                expand_node(item, ctx, &child_location(location, &segment), out);
            }
        }
        _ => {}
    }
}
