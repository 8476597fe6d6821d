use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parse_store_date;
use crate::store::Record;

/// A bounded time window belonging to at most one sector.
///
/// The sector link here is authoritative: when an assignment carries its own
/// (denormalized) sector reference, the timeslot's wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timeslot {
    pub id: String,
    pub name: String,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub sector_id: Option<String>,
    /// Target headcount for this slot, when the base tracks it per slot.
    pub capacity: Option<u32>,
}

impl Timeslot {
    pub fn from_record(record: &Record) -> Self {
        let date_start = Self::parse_date_field(record, "dateStart");
        let date_end = Self::parse_date_field(record, "dateEnd");
        Self {
            id: record.id.clone(),
            name: record.str_field("name").unwrap_or_default().to_string(),
            date_start,
            date_end,
            sector_id: record.single_link("sector"),
            capacity: record.u32_field("capacity"),
        }
    }

    fn parse_date_field(record: &Record, field: &str) -> Option<DateTime<Utc>> {
        let raw = record.str_field(field)?;
        let parsed = parse_store_date(raw);
        if parsed.is_none() {
            debug!(timeslot = %record.id, field = field, value = %raw, "Unparsable date, treated as absent");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timeslot_record(fields: serde_json::Value) -> Record {
        let serde_json::Value::Object(map) = fields else {
            panic!("fixture fields must be an object");
        };
        Record::new("recTSL0000000001A", map)
    }

    #[test]
    fn parses_window_and_sector() {
        let slot = Timeslot::from_record(&timeslot_record(json!({
            "name": "Friday evening",
            "dateStart": "2025-01-10T18:00:00Z",
            "dateEnd": "2025-01-10T23:00:00Z",
            "sector": ["recSEC0000000001A"],
            "capacity": 4,
        })));
        assert_eq!(slot.name, "Friday evening");
        assert!(slot.date_start.is_some());
        assert_eq!(slot.sector_id.as_deref(), Some("recSEC0000000001A"));
        assert_eq!(slot.capacity, Some(4));
    }

    #[test]
    fn bare_sector_id_normalizes() {
        let slot = Timeslot::from_record(&timeslot_record(json!({
            "sector": "recSEC0000000001A",
        })));
        assert_eq!(slot.sector_id.as_deref(), Some("recSEC0000000001A"));
    }

    #[test]
    fn bad_date_is_absent_not_fatal() {
        let slot = Timeslot::from_record(&timeslot_record(json!({
            "dateStart": "whenever",
        })));
        assert!(slot.date_start.is_none());
    }
}
