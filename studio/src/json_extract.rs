//! JSON extraction from LLM output, shared by every agent.
//!
//! Policy: strip markdown fences; if the text starts with `{`, parse
//! directly; otherwise scan for the first `{`, track brace depth, and parse
//! the balanced substring. Returns `None` when nothing parses.

use serde_json::Value;

/// Strips a single ```...``` fence (with optional `json` tag) wrapping the text.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag on the opening line.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Returns the first balanced `{…}` substring, tracking depth and JSON
/// string literals (braces inside strings do not count).
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extracts one JSON object from LLM output. `None` on no `{`, unbalanced
/// braces, or invalid JSON.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = strip_fences(text);
    if text.starts_with('{') {
        if let Ok(v) = serde_json::from_str::<Value>(text) {
            return Some(v);
        }
    }
    let candidate = balanced_object(text)?;
    serde_json::from_str(candidate).ok()
}

/// Like [`extract_json`] but requires a JSON object and returns its map.
pub fn extract_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    match extract_json(text)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_object_parses() {
        let v = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn fenced_object_parses() {
        let v = extract_json("```json\n{\"name\": \"x\"}\n```").unwrap();
        assert_eq!(v["name"], "x");
    }

    #[test]
    fn object_embedded_in_prose_parses() {
        let v = extract_json("Sure! Here you go: {\"ideas\": [1, 2]} hope it helps").unwrap();
        assert_eq!(v["ideas"][1], 2);
    }

    #[test]
    fn nested_braces_are_balanced() {
        let v = extract_json("x {\"a\": {\"b\": {\"c\": 3}}} y").unwrap();
        assert_eq!(v["a"]["b"]["c"], 3);
    }

    #[test]
    fn braces_inside_strings_do_not_count() {
        let v = extract_json(r#"{"text": "curly } brace { soup"}"#).unwrap();
        assert_eq!(v["text"], "curly } brace { soup");
    }

    #[test]
    fn no_brace_returns_none() {
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn unbalanced_braces_return_none() {
        assert!(extract_json("{\"a\": 1").is_none());
    }

    #[test]
    fn invalid_json_returns_none() {
        assert!(extract_json("{not valid}").is_none());
    }

    #[test]
    fn extract_object_rejects_arrays() {
        assert!(extract_object("[1, 2, 3]").is_none());
    }
}
