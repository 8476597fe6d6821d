use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::Record;

/// Field names that have held an assignment's timeslot link. `txand` is the
/// original base's name and still the most common; `timeslot` appeared when
/// records started being written through the admin forms.
pub const TIMESLOT_FIELD_ALIASES: [&str; 3] = ["txand", "txanda", "timeslot"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssignmentStatus {
    Validated,
    Pending,
    Refused,
    Cancelled,
}

impl AssignmentStatus {
    /// Lenient parse: unknown strings become `Pending` with a warning so a
    /// single mistyped status upstream cannot sink a whole join.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("Validated") => Self::Validated,
            Some("Pending") | None => Self::Pending,
            Some("Refused") => Self::Refused,
            Some("Cancelled") => Self::Cancelled,
            Some(other) => {
                warn!(status = %other, "Unknown assignment status, treating as Pending");
                Self::Pending
            }
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validated => write!(f, "Validated"),
            Self::Pending => write!(f, "Pending"),
            Self::Refused => write!(f, "Refused"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// The join entity: one volunteer staffed on one timeslot, with a redundant
/// sector link kept for traceability (the timeslot's own sector link is the
/// one trusted by joins).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub volunteer_ids: Vec<String>,
    pub timeslot_ids: Vec<String>,
    pub sector_ids: Vec<String>,
    pub status: AssignmentStatus,
    pub priority: Option<String>,
}

impl Assignment {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            volunteer_ids: record.id_list("volunteer"),
            timeslot_ids: record.aliased_id_list(&TIMESLOT_FIELD_ALIASES),
            sector_ids: record.id_list("sector"),
            status: AssignmentStatus::parse(record.str_field("status")),
            priority: record.str_field("priority").map(str::to_string),
        }
    }

    pub fn references_volunteer(&self, volunteer_id: &str) -> bool {
        self.volunteer_ids.iter().any(|id| id == volunteer_id)
    }

    pub fn references_timeslot(&self, timeslot_id: &str) -> bool {
        self.timeslot_ids.iter().any(|id| id == timeslot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment_record(fields: serde_json::Value) -> Record {
        let serde_json::Value::Object(map) = fields else {
            panic!("fixture fields must be an object");
        };
        Record::new("recASG0000000001A", map)
    }

    #[test]
    fn parses_links_and_status() {
        let asg = Assignment::from_record(&assignment_record(json!({
            "volunteer": ["recVOL0000000001A"],
            "txand": ["recTSL0000000001A"],
            "sector": "recSEC0000000001A",
            "status": "Validated",
            "priority": "high",
        })));
        assert!(asg.references_volunteer("recVOL0000000001A"));
        assert!(asg.references_timeslot("recTSL0000000001A"));
        assert_eq!(asg.sector_ids, vec!["recSEC0000000001A"]);
        assert_eq!(asg.status, AssignmentStatus::Validated);
    }

    #[test]
    fn timeslot_alias_chain() {
        let asg = Assignment::from_record(&assignment_record(json!({
            "timeslot": ["recTSL0000000002A"],
        })));
        assert_eq!(asg.timeslot_ids, vec!["recTSL0000000002A"]);
    }

    #[test]
    fn unknown_status_downgrades_to_pending() {
        assert_eq!(AssignmentStatus::parse(Some("Maybe")), AssignmentStatus::Pending);
        assert_eq!(AssignmentStatus::parse(None), AssignmentStatus::Pending);
        assert_eq!(AssignmentStatus::parse(Some("Cancelled")), AssignmentStatus::Cancelled);
    }
}
