//! Raw record shape and foreign-key normalization.
//!
//! The store encodes the same logical relationship as either a bare id
//! string or an array of id strings depending on which client wrote the
//! record, and some fields moved names over the life of the upstream base.
//! Both quirks are flattened here, once, so join logic never re-derives
//! the scalar/array check or the alias chain at call sites.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One raw record: stable opaque id plus an open field map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn u32_field(&self, name: &str) -> Option<u32> {
        // Numeric fields occasionally come back as strings
        match self.fields.get(name)? {
            Value::Number(n) => n.as_u64().map(|v| v as u32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Normalized id list for an FK field.
    pub fn id_list(&self, name: &str) -> Vec<String> {
        fk::id_list(self.fields.get(name))
    }

    /// Normalized id list for the first alias that holds any ids.
    pub fn aliased_id_list(&self, aliases: &[&str]) -> Vec<String> {
        for alias in aliases {
            let ids = self.id_list(alias);
            if !ids.is_empty() {
                return ids;
            }
        }
        Vec::new()
    }

    /// First id of an FK field, for 0/1-element relationships.
    pub fn single_link(&self, name: &str) -> Option<String> {
        self.id_list(name).into_iter().next()
    }
}

/// Validate that a string looks like a record id: `rec` followed by 14
/// alphanumeric characters.
pub fn is_record_id(s: &str) -> bool {
    s.len() == 17 && s.starts_with("rec") && s[3..].chars().all(|c| c.is_ascii_alphanumeric())
}

pub mod fk {
    use super::Value;

    /// Normalize an FK value to a list of ids. The store may hold `null`,
    /// a bare id string, or an array of id strings; all three collapse to
    /// the same list. Non-string array elements are dropped.
    pub fn id_list(value: Option<&Value>) -> Vec<String> {
        match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(id)) => {
                if id.is_empty() {
                    Vec::new()
                } else {
                    vec![id.clone()]
                }
            }
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        let Value::Object(map) = fields else {
            panic!("fixture fields must be an object");
        };
        Record::new("recAAAAAAAAAAAAAA", map)
    }

    #[test]
    fn id_list_normalizes_all_encodings() {
        let rec = record(json!({
            "null_fk": null,
            "bare_fk": "recBBBBBBBBBBBBBB",
            "array_fk": ["recCCCCCCCCCCCCCC", "recDDDDDDDDDDDDDD"],
            "mixed_fk": ["recEEEEEEEEEEEEEE", 7, null],
        }));

        assert!(rec.id_list("missing_fk").is_empty());
        assert!(rec.id_list("null_fk").is_empty());
        assert_eq!(rec.id_list("bare_fk"), vec!["recBBBBBBBBBBBBBB"]);
        assert_eq!(
            rec.id_list("array_fk"),
            vec!["recCCCCCCCCCCCCCC", "recDDDDDDDDDDDDDD"]
        );
        // Non-string elements dropped, not fatal
        assert_eq!(rec.id_list("mixed_fk"), vec!["recEEEEEEEEEEEEEE"]);
    }

    #[test]
    fn aliased_id_list_takes_first_nonempty() {
        let rec = record(json!({
            "old_name": [],
            "new_name": ["recBBBBBBBBBBBBBB"],
        }));
        assert_eq!(
            rec.aliased_id_list(&["old_name", "new_name"]),
            vec!["recBBBBBBBBBBBBBB"]
        );
        assert!(rec.aliased_id_list(&["nope", "also_nope"]).is_empty());
    }

    #[test]
    fn record_id_format() {
        assert!(is_record_id("recAAAAAAAAAAAAAA"));
        assert!(is_record_id("rec0123456789abcd"));
        assert!(!is_record_id("badid"));
        assert!(!is_record_id("recAAAAAAAAAAAAA"));
        assert!(!is_record_id("recAAAAAAAAAAAA-A"));
        assert!(!is_record_id("tblAAAAAAAAAAAAAA"));
    }

    #[test]
    fn numeric_fields_accept_strings() {
        let rec = record(json!({"count": 5, "as_string": "12", "junk": "many"}));
        assert_eq!(rec.u32_field("count"), Some(5));
        assert_eq!(rec.u32_field("as_string"), Some(12));
        assert_eq!(rec.u32_field("junk"), None);
    }

    #[test]
    fn single_link_takes_first() {
        let rec = record(json!({"sector": ["recBBBBBBBBBBBBBB", "recCCCCCCCCCCCCCC"]}));
        assert_eq!(rec.single_link("sector").as_deref(), Some("recBBBBBBBBBBBBBB"));
        assert_eq!(rec.single_link("missing"), None);
    }
}
