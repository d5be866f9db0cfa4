//! Environment file (`.env`) reading and updating
//!
//! Reading is done by `dotenvy`. Updates rewrite assignment lines in place
//! so comments, ordering and `export ` prefixes survive.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::Utc;
use tracing::warn;

use crate::error::{KeepsakeError, KeepsakeResult};
use crate::storage::file_io::{restrict_permissions, write_bytes_atomic};

/// Collect dotenv pairs, skipping malformed lines
///
/// Later assignments of the same key win. Read errors are returned.
fn collect_pairs<R: Read>(iter: dotenvy::Iter<R>) -> Result<BTreeMap<String, String>, dotenvy::Error> {
    let mut values = BTreeMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                values.insert(key, value);
            }
            Err(dotenvy::Error::LineParse(line, index)) => {
                warn!(line = %line, index, "Skipping malformed .env line");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(values)
}

/// Parse the contents of an environment file into key/value pairs
pub fn parse_env(contents: &str) -> BTreeMap<String, String> {
    collect_pairs(dotenvy::from_read_iter(contents.as_bytes())).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to parse .env contents");
        BTreeMap::new()
    })
}

/// Load an environment file, returning an empty map if it doesn't exist
pub fn load_env_file(path: &Path) -> KeepsakeResult<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    dotenvy::from_path_iter(path)
        .and_then(collect_pairs)
        .map_err(|e| KeepsakeError::Io(format!("Failed to read {}: {}", path.display(), e)))
}

/// The `export ` prefix (possibly empty) and key of an assignment line
fn assignment_key(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }

    let (prefix, rest) = match trimmed.strip_prefix("export ") {
        Some(rest) => ("export ", rest.trim_start()),
        None => ("", trimmed),
    };
    let (key, _) = rest.split_once('=')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid.then_some((prefix, key))
}

/// Replace or append `KEY="value"` lines in an environment file
///
/// Existing assignments are rewritten in place. Keys not yet present are
/// appended under a generated-at comment. The file is written atomically
/// and restricted to its owner.
pub fn upsert_env_values(path: &Path, values: &BTreeMap<String, String>) -> KeepsakeResult<()> {
    let existing = if path.exists() {
        fs::read_to_string(path).map_err(|e| {
            KeepsakeError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?
    } else {
        String::new()
    };

    let mut written = Vec::new();
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| match assignment_key(line) {
            Some((prefix, key)) if values.contains_key(key) => {
                written.push(key.to_string());
                format!("{}{}", prefix, format_assignment(key, &values[key]))
            }
            _ => line.to_string(),
        })
        .collect();

    let missing: Vec<_> = values
        .iter()
        .filter(|(key, _)| !written.contains(key))
        .collect();

    if !missing.is_empty() {
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("# Generated by keepsake on {}", Utc::now().to_rfc3339()));
        for (key, value) in missing {
            lines.push(format_assignment(key, value));
        }
    }

    let mut contents = lines.join("\n");
    contents.push('\n');

    write_bytes_atomic(path, contents.as_bytes())?;
    restrict_permissions(path)
}

fn format_assignment(key: &str, value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("{}=\"{}\"", key, escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_env() {
        let parsed = parse_env(
            r#"
# comment
JWT_SECRET="quoted value"
export SESSION_SECRET=plain
COOKIE_SECRET='single'
DB_PORT=27017 # inline comment
not a line
"#,
        );

        assert_eq!(parsed["JWT_SECRET"], "quoted value");
        assert_eq!(parsed["SESSION_SECRET"], "plain");
        assert_eq!(parsed["COOKIE_SECRET"], "single");
        assert_eq!(parsed["DB_PORT"], "27017");
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn test_quoted_value_with_trailing_comment() {
        let parsed = parse_env("JWT_SECRET=\"abc\" # rotated 2026\nPORT='80' # http\n");
        assert_eq!(parsed["JWT_SECRET"], "abc");
        assert_eq!(parsed["PORT"], "80");
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, b"JWT_SECRET=\xff\xfe\n").unwrap();

        let err = load_env_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_upsert_keeps_export_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "export JWT_SECRET=old\nexport PORT=3000\n").unwrap();

        let mut values = BTreeMap::new();
        values.insert("JWT_SECRET".to_string(), "new-secret".to_string());
        upsert_env_values(&path, &values).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "export JWT_SECRET=\"new-secret\"\nexport PORT=3000\n");
        assert_eq!(load_env_file(&path).unwrap()["JWT_SECRET"], "new-secret");
    }

    #[test]
    fn test_special_characters_survive_a_rewrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");

        let mut values = BTreeMap::new();
        values.insert("COOKIE_SECRET".to_string(), r#"a"b\c$d=e!%"#.to_string());
        upsert_env_values(&path, &values).unwrap();

        assert_eq!(load_env_file(&path).unwrap()["COOKIE_SECRET"], r#"a"b\c$d=e!%"#);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let values = load_env_file(&temp_dir.path().join(".env")).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_upsert_replaces_and_appends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "# app config\nJWT_SECRET=old\nPORT=3000\n").unwrap();

        let mut values = BTreeMap::new();
        values.insert("JWT_SECRET".to_string(), "new-secret".to_string());
        values.insert("SESSION_SECRET".to_string(), "session".to_string());

        upsert_env_values(&path, &values).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# app config\nJWT_SECRET=\"new-secret\"\nPORT=3000\n"));
        assert!(contents.contains("# Generated by keepsake on"));

        let parsed = parse_env(&contents);
        assert_eq!(parsed["JWT_SECRET"], "new-secret");
        assert_eq!(parsed["SESSION_SECRET"], "session");
        assert_eq!(parsed["PORT"], "3000");
    }

    #[test]
    fn test_upsert_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");

        let mut values = BTreeMap::new();
        values.insert("REDIS_PASSWORD".to_string(), "pw".to_string());
        upsert_env_values(&path, &values).unwrap();

        assert_eq!(load_env_file(&path).unwrap()["REDIS_PASSWORD"], "pw");
    }
}
