//! Sector-centric view: who is staffed where, slot by slot.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{timeslot_order, VolunteerRef};
use crate::cache::BulkDataset;
use crate::enrich::{schedule_outlook, team_sizes, ScheduleOutlook};
use crate::models::{Assignment, AssignmentStatus, Sector, Timeslot, Volunteer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectorView {
    pub sector: SectorSummary,
    /// Every volunteer with at least one assignment in the sector.
    pub volunteers: Vec<SectorVolunteer>,
    /// One group per sector timeslot, zero-volunteer slots included so a
    /// caller can render "0/5 filled" rather than omitting the slot.
    pub timeslot_groups: Vec<TimeslotGroup>,
}

impl SectorView {
    pub fn is_empty(&self) -> bool {
        self.volunteers.is_empty() && self.timeslot_groups.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectorSummary {
    pub id: String,
    pub name: String,
    pub referent_ids: Vec<String>,
    pub total_volunteers: u32,
    pub total_needs: u32,
    pub total_assigned: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectorVolunteer {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub assignments: Vec<AssignmentSlot>,
}

/// One of a volunteer's assignments, annotated with the human-readable
/// names of its timeslots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignmentSlot {
    pub assignment_id: String,
    pub status: AssignmentStatus,
    pub priority: Option<String>,
    pub timeslot_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeslotGroup {
    pub timeslot_id: String,
    pub name: String,
    pub date_start: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    pub volunteers: Vec<VolunteerRef>,
    pub volunteer_count: u32,
    pub outlook: Option<ScheduleOutlook>,
    /// Distinct assignments on this slot across the whole dataset.
    pub team_size: u32,
    pub is_team_work: bool,
}

/// Join the bulk dataset down to one sector.
///
/// Flow: sector timeslots -> timeslot id set -> assignments whose timeslot
/// links intersect the set -> candidate volunteer id set -> volunteers by
/// membership, each with only its own assignments attached.
pub fn build_sector_view(sector: &Sector, bulk: &BulkDataset, now: DateTime<Utc>) -> SectorView {
    let sector_timeslots: Vec<&Timeslot> = bulk
        .timeslots
        .iter()
        .filter(|t| t.sector_id.as_deref() == Some(sector.id.as_str()))
        .collect();
    let timeslot_ids: HashSet<&str> = sector_timeslots.iter().map(|t| t.id.as_str()).collect();
    let timeslot_by_id: HashMap<&str, &Timeslot> =
        sector_timeslots.iter().map(|t| (t.id.as_str(), *t)).collect();

    let sector_assignments: Vec<&Assignment> = bulk
        .assignments
        .iter()
        .filter(|a| a.timeslot_ids.iter().any(|id| timeslot_ids.contains(id.as_str())))
        .collect();

    let candidate_ids: HashSet<&str> = sector_assignments
        .iter()
        .flat_map(|a| a.volunteer_ids.iter().map(String::as_str))
        .collect();

    let volunteer_by_id: HashMap<&str, &Volunteer> = bulk
        .volunteers
        .iter()
        .filter(|v| candidate_ids.contains(v.id.as_str()))
        .map(|v| (v.id.as_str(), v))
        .collect();

    let sizes = team_sizes(&bulk.assignments);

    let mut volunteers: Vec<SectorVolunteer> = volunteer_by_id
        .values()
        .map(|volunteer| {
            let assignments = sector_assignments
                .iter()
                .filter(|a| a.references_volunteer(&volunteer.id))
                .map(|a| annotate_assignment(a, &timeslot_by_id))
                .collect();
            SectorVolunteer {
                id: volunteer.id.clone(),
                display_name: volunteer.display_name(),
                email: volunteer.email.clone(),
                assignments,
            }
        })
        .collect();
    volunteers.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.id.cmp(&b.id)));

    let mut timeslot_groups: Vec<TimeslotGroup> = sector_timeslots
        .iter()
        .map(|timeslot| {
            build_group(timeslot, &sector_assignments, &volunteer_by_id, &sizes, now)
        })
        .collect();
    timeslot_groups.sort_by(|a, b| timeslot_order(a.date_start, &a.name, b.date_start, &b.name));

    SectorView {
        sector: SectorSummary {
            id: sector.id.clone(),
            name: sector.name.clone(),
            referent_ids: sector.referent_ids.clone(),
            total_volunteers: sector.total_volunteers,
            total_needs: sector.total_needs,
            total_assigned: sector.assigned(),
        },
        volunteers,
        timeslot_groups,
    }
}

fn annotate_assignment(
    assignment: &Assignment,
    timeslot_by_id: &HashMap<&str, &Timeslot>,
) -> AssignmentSlot {
    let mut timeslot_names = Vec::new();
    for timeslot_id in &assignment.timeslot_ids {
        match timeslot_by_id.get(timeslot_id.as_str()) {
            Some(timeslot) => timeslot_names.push(timeslot.name.clone()),
            // Links outside the sector (or dangling) are simply not named
            None => debug!(
                assignment = %assignment.id,
                timeslot = %timeslot_id,
                "Assignment timeslot not in sector, skipping name"
            ),
        }
    }
    AssignmentSlot {
        assignment_id: assignment.id.clone(),
        status: assignment.status,
        priority: assignment.priority.clone(),
        timeslot_names,
    }
}

fn build_group(
    timeslot: &Timeslot,
    sector_assignments: &[&Assignment],
    volunteer_by_id: &HashMap<&str, &Volunteer>,
    sizes: &HashMap<String, u32>,
    now: DateTime<Utc>,
) -> TimeslotGroup {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut members: Vec<VolunteerRef> = Vec::new();
    for assignment in sector_assignments {
        if !assignment.references_timeslot(&timeslot.id) {
            continue;
        }
        for volunteer_id in &assignment.volunteer_ids {
            if !seen.insert(volunteer_id.as_str()) {
                continue;
            }
            match volunteer_by_id.get(volunteer_id.as_str()) {
                Some(volunteer) => members.push(VolunteerRef {
                    id: volunteer.id.clone(),
                    display_name: volunteer.display_name(),
                }),
                None => debug!(
                    assignment = %assignment.id,
                    volunteer = %volunteer_id,
                    "Assignment references a volunteer absent from the dataset"
                ),
            }
        }
    }
    members.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.id.cmp(&b.id)));

    let team_size = sizes.get(timeslot.id.as_str()).copied().unwrap_or(0);
    TimeslotGroup {
        timeslot_id: timeslot.id.clone(),
        name: timeslot.name.clone(),
        date_start: timeslot.date_start,
        capacity: timeslot.capacity,
        volunteer_count: members.len() as u32,
        volunteers: members,
        outlook: timeslot.date_start.map(|start| schedule_outlook(start, now)),
        team_size,
        is_team_work: team_size > 1,
    }
}
