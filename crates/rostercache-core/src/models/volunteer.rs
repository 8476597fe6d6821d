use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Field names that have held a volunteer's assignment links over the life
/// of the upstream base, newest first. The first alias with any ids wins.
pub const ASSIGNMENT_FIELD_ALIASES: [&str; 3] = ["assignments", "txands", "shifts"];

/// Same story for mission links (not joined by this layer, but carried so
/// callers can follow them).
pub const MISSION_FIELD_ALIASES: [&str; 3] = ["missions", "tasks", "actions"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volunteer {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Canonical assignment links, alias-resolved at parse time.
    pub assignment_ids: Vec<String>,
    pub mission_ids: Vec<String>,
}

impl Volunteer {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            first_name: record.str_field("firstName").map(str::to_string),
            last_name: record.str_field("lastName").map(str::to_string),
            email: record.str_field("email").map(str::to_string),
            phone: record.str_field("phone").map(str::to_string),
            assignment_ids: record.aliased_id_list(&ASSIGNMENT_FIELD_ALIASES),
            mission_ids: record.aliased_id_list(&MISSION_FIELD_ALIASES),
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.last_name, &self.first_name) {
            (Some(last), Some(first)) => format!("{}, {}", last, first),
            (Some(last), None) => last.clone(),
            (None, Some(first)) => first.clone(),
            (None, None) => self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn volunteer_record(fields: serde_json::Value) -> Record {
        let serde_json::Value::Object(map) = fields else {
            panic!("fixture fields must be an object");
        };
        Record::new("recVOL0000000001A", map)
    }

    #[test]
    fn parses_contact_fields() {
        let vol = Volunteer::from_record(&volunteer_record(json!({
            "firstName": "Maia",
            "lastName": "Etxeberria",
            "email": "maia@example.test",
            "assignments": ["recASG0000000001A"],
        })));
        assert_eq!(vol.display_name(), "Etxeberria, Maia");
        assert_eq!(vol.assignment_ids, vec!["recASG0000000001A"]);
        assert!(vol.mission_ids.is_empty());
    }

    #[test]
    fn legacy_alias_still_resolves() {
        let vol = Volunteer::from_record(&volunteer_record(json!({
            "txands": ["recASG0000000001A", "recASG0000000002A"],
        })));
        assert_eq!(vol.assignment_ids.len(), 2);
    }

    #[test]
    fn newest_alias_wins_over_legacy() {
        let vol = Volunteer::from_record(&volunteer_record(json!({
            "assignments": ["recASG0000000001A"],
            "shifts": ["recASG0000000009A"],
        })));
        assert_eq!(vol.assignment_ids, vec!["recASG0000000001A"]);
    }

    #[test]
    fn empty_record_degrades_to_defaults() {
        let vol = Volunteer::from_record(&volunteer_record(json!({})));
        assert_eq!(vol.display_name(), "recVOL0000000001A");
        assert!(vol.assignment_ids.is_empty());
    }
}
