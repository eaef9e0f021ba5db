//! Merge policy and path addressing over JSON documents.
//!
//! Objects merge key by key with the overlay winning and nested objects
//! recursing. Arrays whose items are all objects with a string `name`
//! merge by name: matching entries merge, new ones append in overlay order.
//! Any other value is replaced.
use serde_json::{Map, Value};

fn entry_name(value: &Value) -> Option<&str> {
    value.get("name").and_then(Value::as_str)
}

fn is_named_list(items: &[Value]) -> bool {
    items.iter().all(|item| entry_name(item).is_some())
}

/// Merge named items of `overlay` into the matching `base` entries and
/// append the rest.
fn merge_named(base: &mut Vec<Value>, overlay: &[Value]) {
    for item in overlay {
        let existing = entry_name(item)
            .and_then(|name| base.iter_mut().find(|b| entry_name(b) == Some(name)));
        match existing {
            Some(target) => merge(target, item),
            None => base.push(item.clone()),
        }
    }
}

/// Deep-merge `overlay` into `base`; `overlay` wins on conflict.
pub fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(overlay))
            if !overlay.is_empty() && is_named_list(base.as_slice()) && is_named_list(overlay) =>
        {
            merge_named(base, overlay);
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Like [`merge`], but arrays always grow: named items merge by name and
/// every other item is appended. A non-array value appended to an array is
/// pushed as one item.
pub fn merge_append(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_append(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(overlay)) => merge_named(base, overlay),
        (Value::Array(base), item) => base.push(item.clone()),
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Split a dot-separated path into segments, ignoring empty ones.
///
/// A segment wrapped in double quotes may contain dots, so an entry named
/// `app.settings` is addressed as `backup.files."app.settings"`.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        let (segment, tail) = match rest.strip_prefix('"') {
            Some(quoted) => {
                let (segment, tail) = quoted.split_once('"').unwrap_or((quoted, ""));
                (segment, tail.strip_prefix('.').unwrap_or(tail))
            }
            None => rest.split_once('.').unwrap_or((rest, "")),
        };
        if !segment.is_empty() {
            out.push(segment);
        }
        rest = tail;
    }
    out
}

fn child_mut<'v>(node: &'v mut Value, segment: &str, create: bool) -> Result<&'v mut Value, String> {
    match node {
        Value::Object(map) => {
            if create {
                Ok(map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new())))
            } else {
                map.get_mut(segment)
                    .ok_or_else(|| format!("no key '{segment}'"))
            }
        }
        Value::Array(items) => {
            let position = items.iter().position(|item| entry_name(item) == Some(segment));
            match position {
                Some(i) => items
                    .get_mut(i)
                    .ok_or_else(|| format!("no entry named '{segment}'")),
                None if create => {
                    let mut entry = Map::new();
                    entry.insert("name".to_string(), Value::String(segment.to_string()));
                    items.push(Value::Object(entry));
                    items
                        .last_mut()
                        .ok_or_else(|| format!("no entry named '{segment}'"))
                }
                None => Err(format!("no entry named '{segment}'")),
            }
        }
        Value::Null if create => {
            *node = Value::Object(Map::new());
            child_mut(node, segment, create)
        }
        other => Err(format!(
            "cannot descend into {} at '{segment}'",
            type_name(other)
        )),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Mutable reference to the node at `path`, creating missing objects (and
/// named list entries) along the way.
///
/// # Errors
///
/// Returns a reason when a segment would descend into a scalar.
pub fn node_mut<'v>(root: &'v mut Value, path: &[&str]) -> Result<&'v mut Value, String> {
    path.iter()
        .try_fold(root, |node, segment| child_mut(node, segment, true))
}

/// Remove the node at `path`. Returns whether anything was removed; a
/// missing path is not an error.
///
/// # Errors
///
/// Returns a reason when a segment would descend into a scalar.
pub fn remove_node(root: &mut Value, path: &[&str]) -> Result<bool, String> {
    let Some((last, parents)) = path.split_last() else {
        return Err("empty path".to_string());
    };
    let mut node = root;
    for segment in parents {
        node = match node {
            Value::Object(_) | Value::Array(_) => match child_mut(node, segment, false) {
                Ok(child) => child,
                Err(_) => return Ok(false),
            },
            Value::Null => return Ok(false),
            other => {
                return Err(format!(
                    "cannot descend into {} at '{segment}'",
                    type_name(other)
                ));
            }
        };
    }
    match node {
        Value::Object(map) => Ok(map.remove(*last).is_some()),
        Value::Array(items) => {
            let before = items.len();
            items.retain(|item| entry_name(item) != Some(*last));
            Ok(items.len() != before)
        }
        Value::Null => Ok(false),
        other => Err(format!(
            "cannot descend into {} at '{last}'",
            type_name(other)
        )),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // merge
    // -----------------------------------------------------------------------

    #[test]
    fn merge_objects_override_wins() {
        let mut base = json!({ "a": 1, "b": { "c": 2, "d": 3 } });
        merge(&mut base, &json!({ "b": { "c": 20 }, "e": 5 }));
        assert_eq!(base, json!({ "a": 1, "b": { "c": 20, "d": 3 }, "e": 5 }));
    }

    #[test]
    fn merge_named_lists_by_name() {
        let mut base = json!([
            { "name": "theme", "path": "HKCU:\\App", "values": { "Theme": "Light", "Size": 1 } },
            { "name": "other", "path": "HKCU:\\Other" }
        ]);
        merge(
            &mut base,
            &json!([
                { "name": "theme", "values": { "Theme": "Dark" } },
                { "name": "new", "path": "HKCU:\\New" }
            ]),
        );
        assert_eq!(
            base,
            json!([
                { "name": "theme", "path": "HKCU:\\App", "values": { "Theme": "Dark", "Size": 1 } },
                { "name": "other", "path": "HKCU:\\Other" },
                { "name": "new", "path": "HKCU:\\New" }
            ])
        );
    }

    #[test]
    fn merge_plain_lists_replace() {
        let mut base = json!({ "tags": ["a", "b"] });
        merge(&mut base, &json!({ "tags": ["c"] }));
        assert_eq!(base, json!({ "tags": ["c"] }));
    }

    #[test]
    fn merge_empty_list_replaces() {
        let mut base = json!({ "files": [{ "name": "a" }] });
        merge(&mut base, &json!({ "files": [] }));
        assert_eq!(base, json!({ "files": [] }));
    }

    #[test]
    fn merge_scalar_replaces_object() {
        let mut base = json!({ "a": { "b": 1 } });
        merge(&mut base, &json!({ "a": null }));
        assert_eq!(base, json!({ "a": null }));
    }

    // -----------------------------------------------------------------------
    // merge_append
    // -----------------------------------------------------------------------

    #[test]
    fn merge_append_extends_plain_lists() {
        let mut base = json!(["a"]);
        merge_append(&mut base, &json!(["b", "c"]));
        assert_eq!(base, json!(["a", "b", "c"]));
    }

    #[test]
    fn merge_append_pushes_single_item() {
        let mut base = json!([{ "name": "a" }]);
        merge_append(&mut base, &json!({ "name": "b" }));
        assert_eq!(base, json!([{ "name": "a" }, { "name": "b" }]));
    }

    #[test]
    fn merge_append_merges_named_duplicates() {
        let mut base = json!([{ "name": "a", "x": 1 }]);
        merge_append(&mut base, &json!([{ "name": "a", "y": 2 }, "plain"]));
        assert_eq!(base, json!([{ "name": "a", "x": 1, "y": 2 }, "plain"]));
    }

    // -----------------------------------------------------------------------
    // paths
    // -----------------------------------------------------------------------

    #[test]
    fn segments_split_on_dots() {
        assert_eq!(segments("backup.registry.theme"), vec!["backup", "registry", "theme"]);
        assert!(segments("").is_empty());
        assert_eq!(segments("a..b."), vec!["a", "b"]);
    }

    #[test]
    fn quoted_segments_keep_dots() {
        assert_eq!(
            segments(r#"backup.files."app.settings".path"#),
            vec!["backup", "files", "app.settings", "path"]
        );
        assert_eq!(segments(r#""a.b""#), vec!["a.b"]);
    }

    #[test]
    fn quoted_segment_addresses_dotted_entry_name() {
        let mut doc = json!({ "backup": { "files": [{ "name": "app.settings", "path": "old" }] } });
        *node_mut(&mut doc, &segments(r#"backup.files."app.settings".path"#)).unwrap() =
            json!("new");
        assert_eq!(doc["backup"]["files"][0]["path"], json!("new"));
        assert!(remove_node(&mut doc, &segments(r#"backup.files."app.settings""#)).unwrap());
        assert_eq!(doc, json!({ "backup": { "files": [] } }));
    }

    #[test]
    fn node_mut_selects_named_entries() {
        let mut doc = json!({ "backup": { "registry": [{ "name": "theme", "values": { "Theme": "Light" } }] } });
        let node = node_mut(&mut doc, &segments("backup.registry.theme.values.Theme")).unwrap();
        *node = json!("Dark");
        assert_eq!(doc["backup"]["registry"][0]["values"]["Theme"], json!("Dark"));
    }

    #[test]
    fn node_mut_creates_missing_path() {
        let mut doc = json!({});
        *node_mut(&mut doc, &segments("restore.files")).unwrap() = json!([]);
        let entry = node_mut(&mut doc, &segments("restore.files.docs")).unwrap();
        entry["path"] = json!("/docs");
        assert_eq!(doc, json!({ "restore": { "files": [{ "name": "docs", "path": "/docs" }] } }));
    }

    #[test]
    fn node_mut_rejects_scalars() {
        let mut doc = json!({ "a": 1 });
        let err = node_mut(&mut doc, &segments("a.b")).unwrap_err();
        assert!(err.contains("a number"), "{err}");
    }

    #[test]
    fn remove_node_from_object_and_list() {
        let mut doc = json!({ "backup": { "files": [{ "name": "a" }, { "name": "b" }], "registry": [] } });
        assert!(remove_node(&mut doc, &segments("backup.files.a")).unwrap());
        assert!(remove_node(&mut doc, &segments("backup.registry")).unwrap());
        assert_eq!(doc, json!({ "backup": { "files": [{ "name": "b" }] } }));
    }

    #[test]
    fn remove_missing_node_is_noop() {
        let mut doc = json!({ "backup": {} });
        assert!(!remove_node(&mut doc, &segments("backup.files.x")).unwrap());
        assert!(!remove_node(&mut doc, &segments("restore.files")).unwrap());
        assert_eq!(doc, json!({ "backup": {} }));
    }
}
