//! Rewrite helpers for the JSON assignment arrays embedded in user rows.
//!
//! There is no way to issue a targeted partial update against a JSON column,
//! so the contract-group cascades read the whole array, rewrite the matching
//! entries in memory and write the column back. Both helpers return `None`
//! when nothing matched so callers can skip the write entirely and leave the
//! stored bytes (and the row version) untouched.

use serde_json::Value;

use crate::error::{Error, Result};

const GROUP_KEY: &str = "contractGroup";

fn parse_entries(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Array(entries) => Ok(entries),
        Value::Null => Ok(Vec::new()),
        _ => Err(Error::Validation(
            "assignments must be a JSON array".to_string(),
        )),
    }
}

fn entry_matches(entry: &Value, name: &str) -> bool {
    entry
        .get(GROUP_KEY)
        .and_then(Value::as_str)
        .is_some_and(|group| group == name)
}

/// Replaces `old` with `new` in every matching entry's `contractGroup`,
/// keeping the entry's other fields and the sequence order intact.
pub fn rename_group(raw: &str, old: &str, new: &str) -> Result<Option<String>> {
    let mut entries = parse_entries(raw)?;
    let mut changed = false;

    for entry in &mut entries {
        if entry_matches(entry, old) {
            entry[GROUP_KEY] = Value::String(new.to_string());
            changed = true;
        }
    }

    if !changed {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&Value::Array(entries))?))
}

/// Removes every entry assigned to `name`, keeping the remaining entries in
/// their original order.
pub fn remove_group(raw: &str, name: &str) -> Result<Option<String>> {
    let entries = parse_entries(raw)?;
    let kept: Vec<Value> = entries
        .iter()
        .filter(|entry| !entry_matches(entry, name))
        .cloned()
        .collect();

    if kept.len() == entries.len() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&Value::Array(kept))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        r#"[{"contractGroup":"Bairro Centro","role":"lead"},{"contractGroup":"Other"}]"#;

    #[test]
    fn test_rename_rewrites_matching_entries_only() {
        let out = rename_group(SAMPLE, "Bairro Centro", "Centro Novo")
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            r#"[{"contractGroup":"Centro Novo","role":"lead"},{"contractGroup":"Other"}]"#
        );
    }

    #[test]
    fn test_rename_without_match_is_a_noop() {
        assert!(rename_group(SAMPLE, "Zona Sul", "Zona Norte").unwrap().is_none());
    }

    #[test]
    fn test_rename_preserves_extra_fields_and_order() {
        let raw = r#"[{"zone":"A","contractGroup":"X","shift":"night"},{"contractGroup":"Y"}]"#;
        let out = rename_group(raw, "X", "Z").unwrap().unwrap();
        assert_eq!(
            out,
            r#"[{"zone":"A","contractGroup":"Z","shift":"night"},{"contractGroup":"Y"}]"#
        );
    }

    #[test]
    fn test_remove_strips_matching_entries() {
        let out = remove_group(SAMPLE, "Bairro Centro").unwrap().unwrap();
        assert_eq!(out, r#"[{"contractGroup":"Other"}]"#);
    }

    #[test]
    fn test_remove_without_match_is_a_noop() {
        assert!(remove_group(SAMPLE, "Zona Sul").unwrap().is_none());
    }

    #[test]
    fn test_null_column_treated_as_empty() {
        assert!(rename_group("null", "X", "Y").unwrap().is_none());
        assert!(remove_group("null", "X").unwrap().is_none());
    }

    #[test]
    fn test_non_array_rejected() {
        assert!(rename_group(r#"{"contractGroup":"X"}"#, "X", "Y").is_err());
    }
}
