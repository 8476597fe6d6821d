//! Typed views of the four upstream collections.
//!
//! Parsing is infallible by design: a record with missing or malformed
//! fields becomes a model with defaults, never an error. Field aliases and
//! FK encodings are resolved here, once, so the join layer works with
//! canonical attributes only.

pub mod assignment;
pub mod sector;
pub mod timeslot;
pub mod volunteer;

pub use assignment::{Assignment, AssignmentStatus};
pub use sector::Sector;
pub use timeslot::Timeslot;
pub use volunteer::Volunteer;

use chrono::{DateTime, NaiveDate, Utc};

// Upstream collection names
pub const VOLUNTEERS: &str = "volunteers";
pub const SECTORS: &str = "sectors";
pub const TIMESLOTS: &str = "timeslots";
pub const ASSIGNMENTS: &str = "assignments";

/// Parse a store date value: RFC 3339 first, bare `YYYY-MM-DD` (midnight
/// UTC) as a fallback. Anything else is `None`.
pub fn parse_store_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
