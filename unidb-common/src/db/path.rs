//! Dotted field paths and value keys
//!
//! Paths such as `course_info.code_module` address nested fields. The same
//! path is used to read a field from an in-memory document and to build the
//! `json_extract` expression behind a SQLite index.

use crate::db::store::Document;
use crate::{Error, Result};
use serde_json::Value;

/// Check that an identifier is safe to splice into SQL
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a dotted path into its segments, rejecting anything that is not a plain identifier
pub fn segments(path: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().all(|p| is_identifier(p)) {
        Ok(parts)
    } else {
        Err(Error::InvalidInput(format!("invalid field path '{}'", path)))
    }
}

/// SQLite JSON path for a dotted field path (`a.b` -> `$.a.b`)
pub fn json_path(path: &str) -> Result<String> {
    Ok(format!("$.{}", segments(path)?.join(".")))
}

/// Look up a nested field; `None` when any segment is missing or not an object
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Canonical grouping key for a field value
///
/// Missing fields group with explicit nulls, and numbers group by numeric
/// value (`5` and `5.0` land in the same group).
pub fn group_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => format!("n:{}", i),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("n:{}", f as i64),
            (None, Some(f)) => format!("n:{}", f),
            (None, None) => format!("n:{}", n),
        },
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_get_nested_path() {
        let d = doc(json!({"course_info": {"code_module": "AAA"}, "score": 70}));
        assert_eq!(get_path(&d, "course_info.code_module"), Some(&json!("AAA")));
        assert_eq!(get_path(&d, "score"), Some(&json!(70)));
        assert_eq!(get_path(&d, "course_info.code_presentation"), None);
        assert_eq!(get_path(&d, "score.value"), None);
    }

    #[test]
    fn test_json_path_rejects_injection() {
        assert_eq!(json_path("assessment_info.type").unwrap(), "$.assessment_info.type");
        assert!(json_path("score') --").is_err());
        assert!(json_path("a..b").is_err());
    }

    #[test]
    fn test_group_key_numeric_equivalence() {
        assert_eq!(group_key(Some(&json!(5))), group_key(Some(&json!(5.0))));
        assert_ne!(group_key(Some(&json!(5))), group_key(Some(&json!("5"))));
        assert_eq!(group_key(None), group_key(Some(&Value::Null)));
    }
}
