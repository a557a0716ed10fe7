//! Parse `.env` into a key-value map. Application (no-overwrite) happens in lib.

use std::collections::HashMap;
use std::path::Path;

/// Minimal .env parser: `KEY=VALUE` lines, `#` comment lines skipped,
/// surrounding single or double quotes stripped (double quotes support `\"`).
/// No multiline values.
fn parse(content: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        let raw = v.trim();
        let value = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            raw[1..raw.len() - 1].replace("\\\"", "\"")
        } else if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            raw[1..raw.len() - 1].to_string()
        } else {
            raw.to_string()
        };
        out.insert(key.to_string(), value);
    }
    out
}

/// Loads `.env` from `override_dir` or the current directory.
/// A missing file yields an empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    let dir = match override_dir.map(Path::to_path_buf).or_else(|| std::env::current_dir().ok()) {
        Some(d) => d,
        None => return Ok(HashMap::new()),
    };
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    Ok(parse(&std::fs::read_to_string(&path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_values() {
        let m = parse("A=1\nB=\"two words\"\nC='single'\n");
        assert_eq!(m.get("A"), Some(&"1".to_string()));
        assert_eq!(m.get("B"), Some(&"two words".to_string()));
        assert_eq!(m.get("C"), Some(&"single".to_string()));
    }

    #[test]
    fn skips_comments_blank_lines_and_bad_lines() {
        let m = parse("# comment\n\nno_equals_here\nKEY=ok\n=anon\n");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("KEY"), Some(&"ok".to_string()));
    }

    #[test]
    fn escaped_quotes_inside_double_quoted_value() {
        let m = parse(r#"K="say \"hi\"""#);
        assert_eq!(m.get("K"), Some(&"say \"hi\"".to_string()));
    }

    #[test]
    fn missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_map(Some(dir.path())).unwrap().is_empty());
    }
}
