//! Flattening of JSON response bodies into `path -> string` maps.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Separator between a parent key and a nested key.
pub const PATH_SEPARATOR: char = '.';

/// Flattens a JSON object one level deep.
///
/// - string values are kept as-is under their key
/// - object values contribute `parent.child` entries for their string-valued
///   children only; non-string children are dropped and nothing deeper is
///   visited
/// - every other value (number, boolean, null, array) is stored under its key
///   in its default textual representation, which is its compact JSON text:
///   `null` stays `null` and `["a","b"]` stays `["a","b"]`
///
/// The asymmetry is load-bearing: catalog detail formats such as
/// `user: {{.login}}` and `{{index . "account.email"}}` are written against it.
#[must_use]
pub fn flatten(object: &Map<String, Value>) -> HashMap<String, String> {
    let mut out = HashMap::with_capacity(object.len());

    for (key, value) in object {
        match value {
            Value::String(s) => {
                out.insert(key.clone(), s.clone());
            }
            Value::Object(children) => {
                for (child_key, child) in children {
                    if let Value::String(s) = child {
                        out.insert(format!("{key}{PATH_SEPARATOR}{child_key}"), s.clone());
                    }
                }
            }
            other => {
                out.insert(key.clone(), other.to_string());
            }
        }
    }

    out
}
