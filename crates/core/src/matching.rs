//! Greedy date-proximity matching of records to schedule slots.
//!
//! Records are visited in ascending date order. Each one takes the still-free slot whose target
//! date is nearest; on equal distance the slot earliest in catalog order wins. A taken slot is
//! never reconsidered, so the result is not a globally optimal assignment. Encounters and
//! appointments share the same routine; the appointment pass starts with completed slots
//! already marked as taken.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::records::{AppointmentRecord, DatedRecord, RecordMatch, VisitRecord};
use crate::schedule::ScheduledCheckup;

/// Matches keyed by control number.
pub type Matches = BTreeMap<u32, RecordMatch>;

/// Assigns each dated record to the nearest free slot.
///
/// `taken` holds control numbers that are unavailable before the first record is placed.
/// Records without a date are ignored. Records left over once every slot is taken are dropped.
pub fn assign_nearest<'a, R, I>(
    schedule: &[ScheduledCheckup],
    records: I,
    taken: &BTreeSet<u32>,
) -> Matches
where
    R: DatedRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut available: Vec<bool> = schedule
        .iter()
        .map(|slot| !taken.contains(&slot.control_number()))
        .collect();

    let mut dated: Vec<(chrono::NaiveDate, &R)> = records
        .into_iter()
        .filter_map(|record| record.record_date().map(|date| (date, record)))
        .collect();
    // Stable: records sharing a date keep their input order.
    dated.sort_by_key(|(date, _)| *date);

    let mut matches = Matches::new();
    for (date, record) in dated {
        let mut best: Option<(usize, u64)> = None;
        for (idx, slot) in schedule.iter().enumerate() {
            if !available[idx] {
                continue;
            }
            let distance = slot.distance_days(date);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((idx, distance));
            }
        }

        let Some((idx, distance)) = best else {
            debug!(record = record.record_id(), "no free slot left, record dropped");
            continue;
        };

        available[idx] = false;
        let control_number = schedule[idx].control_number();
        debug!(
            record = record.record_id(),
            control_number, distance, "record matched to control"
        );
        matches.insert(
            control_number,
            RecordMatch {
                id: record.record_id().to_string(),
                date,
            },
        );
    }

    matches
}

/// Matches completed visits to schedule slots.
pub fn match_encounters(schedule: &[ScheduledCheckup], visits: &[VisitRecord]) -> Matches {
    assign_nearest(schedule, visits, &BTreeSet::new())
}

/// Matches booked appointments to slots that have no completed visit.
///
/// Cancelled appointments are a caller concern and must be removed before this is called.
pub fn match_appointments(
    schedule: &[ScheduledCheckup],
    appointments: &[AppointmentRecord],
    completed_controls: &BTreeSet<u32>,
) -> Matches {
    assign_nearest(schedule, appointments, completed_controls)
}

/// Control numbers that already hold a match.
pub fn matched_controls(matches: &Matches) -> BTreeSet<u32> {
    matches.keys().copied().collect()
}
