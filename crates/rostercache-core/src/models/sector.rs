use serde::{Deserialize, Serialize};

use crate::store::Record;

/// A named work area.
///
/// Headcount semantics are fixed here and used consistently everywhere:
/// `total_volunteers` is the target headcount for the sector,
/// `total_needs` is the count of slots still unfilled, and the assigned
/// count is derived from the two rather than read from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sector {
    pub id: String,
    pub name: String,
    /// Manager volunteer ids.
    pub referent_ids: Vec<String>,
    pub total_volunteers: u32,
    pub total_needs: u32,
}

impl Sector {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            name: record.str_field("name").unwrap_or_default().to_string(),
            referent_ids: record.id_list("referents"),
            total_volunteers: record.u32_field("totalVolunteers").unwrap_or(0),
            total_needs: record.u32_field("totalNeeds").unwrap_or(0),
        }
    }

    /// Slots already filled. Clamped: a shortfall larger than the target
    /// (stale counters upstream) reads as zero assigned, not a wraparound.
    pub fn assigned(&self) -> u32 {
        self.total_volunteers.saturating_sub(self.total_needs)
    }

    pub fn has_shortage(&self) -> bool {
        self.total_needs != 0
    }
}
