//! Bounded deep copy of free-form survey answers.
//!
//! Survey data is user-submitted JSON of arbitrary shape. Before it is
//! embedded in a prompt it is copied with hard limits on nesting depth,
//! array length, and string length. Nulls are dropped.

use serde_json::{Map, Value};

/// Deepest level kept. The root value is level 0; anything nested below
/// level 4 is dropped.
pub const MAX_DEPTH: usize = 4;
/// Longest array kept; extra elements are dropped.
pub const MAX_ARRAY_LEN: usize = 50;
/// Character cap for a root string and for string fields of a root object.
pub const MAX_TOP_LEVEL_STRING_CHARS: usize = 1000;
/// Character cap for strings inside nested objects and arrays.
pub const MAX_NESTED_STRING_CHARS: usize = 500;

/// Limits applied by [`sanitize_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeLimits {
    pub max_depth: usize,
    pub max_array_len: usize,
    pub max_top_level_chars: usize,
    pub max_nested_chars: usize,
}

impl Default for SanitizeLimits {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_array_len: MAX_ARRAY_LEN,
            max_top_level_chars: MAX_TOP_LEVEL_STRING_CHARS,
            max_nested_chars: MAX_NESTED_STRING_CHARS,
        }
    }
}

/// Sanitize survey data with the default limits.
///
/// Returns `None` when nothing survives (e.g. the input is `null`).
pub fn sanitize_survey(value: &Value) -> Option<Value> {
    sanitize_with(value, &SanitizeLimits::default())
}

/// Sanitize `value` with explicit limits.
pub fn sanitize_with(value: &Value, limits: &SanitizeLimits) -> Option<Value> {
    sanitize_node(value, 0, true, limits)
}

/// `top_level` is true for the root value and the direct fields of a root
/// object. Array elements are always nested.
fn sanitize_node(
    value: &Value,
    depth: usize,
    top_level: bool,
    limits: &SanitizeLimits,
) -> Option<Value> {
    if depth > limits.max_depth {
        return None;
    }
    match value {
        Value::Null => None,
        Value::Bool(_) | Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let cap = if top_level {
                limits.max_top_level_chars
            } else {
                limits.max_nested_chars
            };
            Some(Value::String(truncate_chars(s, cap)))
        }
        Value::Array(items) => {
            let kept = items
                .iter()
                .take(limits.max_array_len)
                .filter_map(|item| sanitize_node(item, depth + 1, false, limits))
                .collect();
            Some(Value::Array(kept))
        }
        Value::Object(fields) => {
            let kept: Map<String, Value> = fields
                .iter()
                .filter_map(|(key, field)| {
                    sanitize_node(field, depth + 1, depth == 0, limits).map(|v| (key.clone(), v))
                })
                .collect();
            Some(Value::Object(kept))
        }
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_owned(),
        None => s.to_owned(),
    }
}
