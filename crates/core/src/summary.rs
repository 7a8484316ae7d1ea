//! Derived views over a classified schedule.

use serde::Serialize;
use utoipa::ToSchema;

use crate::classify::{CheckupStatus, ClassifiedCheckup};
use crate::constants::CATALOG_SIZE;

/// Progress summary shown alongside the schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScheduleSummary {
    /// First overdue or pending control in catalog order.
    pub next_due: Option<ClassifiedCheckup>,
    /// Every overdue control, in catalog order.
    pub overdue: Vec<ClassifiedCheckup>,
    pub completed_count: usize,
    /// Always the catalog size, not the length of the classified input.
    pub total_count: usize,
}

impl ScheduleSummary {
    pub fn from_classified(checkups: &[ClassifiedCheckup]) -> Self {
        let next_due = checkups.iter().find(|c| c.status.is_due()).cloned();
        let overdue = checkups
            .iter()
            .filter(|c| c.status == CheckupStatus::Overdue)
            .cloned()
            .collect();
        let completed_count = checkups
            .iter()
            .filter(|c| c.status == CheckupStatus::Completed)
            .count();

        Self {
            next_due,
            overdue,
            completed_count,
            total_count: CATALOG_SIZE,
        }
    }

    pub fn next_due_control(&self) -> Option<u32> {
        self.next_due.as_ref().map(ClassifiedCheckup::control_number)
    }

    pub fn overdue_controls(&self) -> Vec<u32> {
        self.overdue
            .iter()
            .map(ClassifiedCheckup::control_number)
            .collect()
    }
}

/// The first `n` controls, in catalog order, that have neither a visit nor an appointment.
///
/// This is the default selection handed to the appointment batch creator.
pub fn lookahead(checkups: &[ClassifiedCheckup], n: usize) -> Vec<ClassifiedCheckup> {
    checkups
        .iter()
        .filter(|c| c.status.is_unmatched())
        .take(n)
        .cloned()
        .collect()
}
