//! Schema-on-read access to loosely structured JSON payloads.
//!
//! Every lookup returns `Option`: a missing key, a non-container intermediate
//! node, `null` or a blank string all read as "not found".

use serde_json::Value;

/// Walk a dotted path (`"reason.description"`). Numeric segments index arrays.
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        other => Some(other),
    }
}

/// Text at `path`: non-blank strings (trimmed) and numbers only.
pub fn text_at(root: &Value, path: &str) -> Option<String> {
    match value_at(root, path)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-blank text among `paths`, tried in order.
pub fn first_text(root: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| text_at(root, path))
}

/// Array at `path`; an empty path means the root itself.
pub fn array_at<'a>(root: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
    let node = if path.is_empty() {
        root
    } else {
        value_at(root, path)?
    };
    node.as_array()
}

/// Keep the first `limit` characters and append `...` when the text is longer.
pub fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}
