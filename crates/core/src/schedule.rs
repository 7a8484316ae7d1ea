//! Schedule generation.
//!
//! Turns the static catalog into concrete target dates for one child. The result is never
//! stored; every call recomputes it from the birth date.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::{checkup_definitions, CheckupDefinition};

/// A catalog control anchored to a calendar date for a specific child.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScheduledCheckup {
    #[serde(flatten)]
    pub definition: CheckupDefinition,
    /// Birth date plus `target_age_days`.
    pub target_date: NaiveDate,
}

impl ScheduledCheckup {
    pub fn control_number(&self) -> u32 {
        self.definition.control_number
    }

    /// Absolute distance in days between the target date and `date`.
    pub fn distance_days(&self, date: NaiveDate) -> u64 {
        (self.target_date - date).num_days().unsigned_abs()
    }
}

/// Generates the expected CRED calendar for a child born on `birth_date`.
///
/// Offsets are plain day arithmetic. A birth date in the future is accepted and simply yields
/// future target dates.
///
/// Target dates strictly increase in control order for every birth date up to
/// `NaiveDate::MAX` minus the last control's offset. Past that point dates that would
/// overflow the calendar saturate at `NaiveDate::MAX`, so the trailing controls share it.
pub fn generate_schedule(birth_date: NaiveDate) -> Vec<ScheduledCheckup> {
    checkup_definitions()
        .iter()
        .map(|definition| ScheduledCheckup {
            definition: *definition,
            target_date: birth_date
                .checked_add_days(Days::new(u64::from(definition.target_age_days)))
                .unwrap_or(NaiveDate::MAX),
        })
        .collect()
}
