//! Volunteer-centric view: one volunteer's assignments with their timeslot
//! and sector resolved.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::timeslot_order;
use crate::enrich::{schedule_outlook, ScheduleOutlook};
use crate::models::{Assignment, AssignmentStatus, Sector, Timeslot, Volunteer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolunteerView {
    pub volunteer: Volunteer,
    pub assignments: Vec<EnrichedAssignment>,
}

impl VolunteerView {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedAssignment {
    pub id: String,
    pub status: AssignmentStatus,
    pub priority: Option<String>,
    pub timeslot: Option<Timeslot>,
    pub sector: Option<Sector>,
    pub outlook: Option<ScheduleOutlook>,
    pub team_size: u32,
    pub is_team_work: bool,
}

/// Attach resolved timeslot and sector objects to each of a volunteer's
/// assignments.
///
/// The timeslot's own sector link is authoritative; the assignment's
/// denormalized copy is only used when the timeslot is missing or carries
/// no link. `team_sizes` must come from the full bulk assignment set so the
/// count reflects total staffing, not just this volunteer's peers.
pub fn build_volunteer_view(
    volunteer: Volunteer,
    assignments: &[Assignment],
    timeslots: &HashMap<String, Timeslot>,
    sectors: &HashMap<String, Sector>,
    team_sizes: &HashMap<String, u32>,
    now: DateTime<Utc>,
) -> VolunteerView {
    let mut enriched: Vec<EnrichedAssignment> = assignments
        .iter()
        .map(|assignment| {
            let timeslot = assignment
                .timeslot_ids
                .iter()
                .find_map(|id| timeslots.get(id))
                .cloned();
            if timeslot.is_none() && !assignment.timeslot_ids.is_empty() {
                debug!(
                    assignment = %assignment.id,
                    "Assignment timeslots all dangling, serving it bare"
                );
            }

            let sector = resolve_sector(assignment, timeslot.as_ref(), sectors);
            let team_size = timeslot
                .as_ref()
                .and_then(|t| team_sizes.get(&t.id).copied())
                .unwrap_or(0);
            EnrichedAssignment {
                id: assignment.id.clone(),
                status: assignment.status,
                priority: assignment.priority.clone(),
                outlook: timeslot
                    .as_ref()
                    .and_then(|t| t.date_start)
                    .map(|start| schedule_outlook(start, now)),
                timeslot,
                sector,
                team_size,
                is_team_work: team_size > 1,
            }
        })
        .collect();

    enriched.sort_by(|a, b| {
        let a_start = a.timeslot.as_ref().and_then(|t| t.date_start);
        let b_start = b.timeslot.as_ref().and_then(|t| t.date_start);
        let a_name = a.timeslot.as_ref().map(|t| t.name.as_str()).unwrap_or("");
        let b_name = b.timeslot.as_ref().map(|t| t.name.as_str()).unwrap_or("");
        timeslot_order(a_start, a_name, b_start, b_name).then_with(|| a.id.cmp(&b.id))
    });

    VolunteerView {
        volunteer,
        assignments: enriched,
    }
}

fn resolve_sector(
    assignment: &Assignment,
    timeslot: Option<&Timeslot>,
    sectors: &HashMap<String, Sector>,
) -> Option<Sector> {
    if let Some(timeslot) = timeslot {
        if let Some(sector_id) = &timeslot.sector_id {
            if let Some(sector) = sectors.get(sector_id) {
                return Some(sector.clone());
            }
            debug!(
                timeslot = %timeslot.id,
                sector = %sector_id,
                "Timeslot sector absent from fetched set"
            );
        }
    }
    // Fall back to the assignment's own (possibly stale) link
    assignment
        .sector_ids
        .iter()
        .find_map(|id| sectors.get(id))
        .cloned()
}
