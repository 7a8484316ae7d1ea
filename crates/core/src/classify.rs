//! Status classification of schedule slots.

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::matching::Matches;
use crate::records::RecordMatch;
use crate::schedule::ScheduledCheckup;

/// Final state of a control for one computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckupStatus {
    /// A visit was matched.
    Completed,
    /// No visit, but an active appointment was matched.
    Scheduled,
    /// Target date has passed with nothing matched.
    Overdue,
    /// Target date is today.
    Pending,
    /// Target date is still ahead.
    Future,
}

impl CheckupStatus {
    /// Due now or late, with nothing booked.
    pub fn is_due(self) -> bool {
        matches!(self, CheckupStatus::Overdue | CheckupStatus::Pending)
    }

    /// No visit and no appointment.
    pub fn is_unmatched(self) -> bool {
        matches!(
            self,
            CheckupStatus::Overdue | CheckupStatus::Pending | CheckupStatus::Future
        )
    }
}

/// The record that settled a slot. A visit always wins over an appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum MatchedRecord {
    Visit { id: String, date: NaiveDate },
    Appointment { id: String, date: NaiveDate },
}

impl MatchedRecord {
    pub fn id(&self) -> &str {
        match self {
            MatchedRecord::Visit { id, .. } | MatchedRecord::Appointment { id, .. } => id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            MatchedRecord::Visit { date, .. } | MatchedRecord::Appointment { date, .. } => *date,
        }
    }
}

/// A schedule slot with its derived status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClassifiedCheckup {
    #[serde(flatten)]
    pub checkup: ScheduledCheckup,
    pub status: CheckupStatus,
    pub matched: Option<MatchedRecord>,
}

impl ClassifiedCheckup {
    pub fn control_number(&self) -> u32 {
        self.checkup.control_number()
    }
}

/// Derives one status per slot, in schedule order.
///
/// Priority: visit match, then appointment match, then the target date compared to `today`.
pub fn classify(
    schedule: &[ScheduledCheckup],
    encounter_matches: &Matches,
    appointment_matches: &Matches,
    today: NaiveDate,
) -> Vec<ClassifiedCheckup> {
    schedule
        .iter()
        .map(|slot| {
            let control = slot.control_number();
            let (status, matched) = if let Some(RecordMatch { id, date }) =
                encounter_matches.get(&control)
            {
                (
                    CheckupStatus::Completed,
                    Some(MatchedRecord::Visit {
                        id: id.clone(),
                        date: *date,
                    }),
                )
            } else if let Some(RecordMatch { id, date }) = appointment_matches.get(&control) {
                (
                    CheckupStatus::Scheduled,
                    Some(MatchedRecord::Appointment {
                        id: id.clone(),
                        date: *date,
                    }),
                )
            } else if today > slot.target_date {
                (CheckupStatus::Overdue, None)
            } else if today == slot.target_date {
                (CheckupStatus::Pending, None)
            } else {
                (CheckupStatus::Future, None)
            };

            ClassifiedCheckup {
                checkup: *slot,
                status,
                matched,
            }
        })
        .collect()
}
