//! Denormalized query views.
//!
//! The builders here turn flat collections into the groupings a query
//! needs, in time linear in collection size. They are synchronous and pure:
//! fetching happens in the service, enrichment values come from `enrich`
//! with an explicit "now". Dangling references are skipped with a log line,
//! never a failure.

pub mod sector;
pub mod volunteer;

pub use sector::{build_sector_view, AssignmentSlot, SectorSummary, SectorView, SectorVolunteer, TimeslotGroup};
pub use volunteer::{build_volunteer_view, EnrichedAssignment, VolunteerView};

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimal volunteer identity carried inside groupings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolunteerRef {
    pub id: String,
    pub display_name: String,
}

/// Timeslot ordering: start date ascending, lexicographic name when start
/// dates are absent or equal.
pub(crate) fn timeslot_order(
    a_start: Option<DateTime<Utc>>,
    a_name: &str,
    b_start: Option<DateTime<Utc>>,
    b_name: &str,
) -> Ordering {
    match (a_start, b_start) {
        (Some(a), Some(b)) => a.cmp(&b).then_with(|| a_name.cmp(b_name)),
        _ => a_name.cmp(b_name),
    }
}
