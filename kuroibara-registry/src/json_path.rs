//! Minimal dot-path resolution for the Generic Adapter's JSON format,
//! the API-response analogue of [`crate::html`]'s CSS selectors.
//!
//! A path is a dot-separated sequence of object keys and/or numeric array
//! indices, e.g. `"data.attributes.title.en"` or `"relationships.0.id"`.
//! There is no wildcard/flatten syntax: `search_items` names the single
//! array of result items, and every other path is evaluated relative to
//! one item at a time.

use serde_json::Value;

fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.').map(str::trim).filter(|s| !s.is_empty()) {
        current = if let Ok(index) = segment.parse::<usize>() {
            current.as_array()?.get(index)?
        } else {
            current.as_object()?.get(segment)?
        };
    }
    Some(current)
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Select the array of items named by `path` (the `search_items` path),
/// relative to `root`. Returns an empty vector if the path does not
/// resolve to an array.
#[must_use]
pub fn select_items<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    resolve(root, path).and_then(Value::as_array).map_or_else(Vec::new, |a| a.iter().collect())
}

/// Evaluate a fallback chain of paths against `item`, returning the first
/// path that resolves to a non-empty string/number/bool.
#[must_use]
pub fn extract_first(item: &Value, chain: &[String]) -> Option<String> {
    chain.iter().find_map(|path| resolve(item, path).and_then(as_string))
}

/// Whether any path in `chain` resolves to a present (non-null) value,
/// used for presence-only fields like `nsfw_indicator`.
#[must_use]
pub fn any_present(item: &Value, chain: &[String]) -> bool {
    chain.iter().any(|path| !matches!(resolve(item, path), None | Some(Value::Null)))
}

/// Evaluate a fallback chain against `item`, returning every value found by
/// the first path in the chain that resolves to something: every element
/// of an array, or the single scalar itself. Used for the `chapters`/
/// `pages` keys, which name a repeating field rather than a single one.
#[must_use]
pub fn extract_all(item: &Value, chain: &[String]) -> Vec<String> {
    for path in chain {
        let Some(value) = resolve(item, path) else { continue };
        let values: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(as_string).collect(),
            other => as_string(other).into_iter().collect(),
        };
        if !values.is_empty() {
            return values;
        }
    }
    Vec::new()
}
