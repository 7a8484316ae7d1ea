//! Visit and appointment records supplied by external data sources.
//!
//! These are the only inputs the matchers see besides the generated schedule. Records with no
//! usable date are carried through unchanged and dropped by the matchers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A recorded clinic visit (encounter) that took place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VisitRecord {
    pub id: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// A booked appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AppointmentRecord {
    pub id: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub cancelled: bool,
}

/// Identifier and date of the record bound to a schedule slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecordMatch {
    pub id: String,
    pub date: NaiveDate,
}

/// Anything the greedy matcher can place on the calendar.
pub trait DatedRecord {
    fn record_id(&self) -> &str;
    fn record_date(&self) -> Option<NaiveDate>;
}

impl DatedRecord for VisitRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn record_date(&self) -> Option<NaiveDate> {
        self.date
    }
}

impl DatedRecord for AppointmentRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn record_date(&self) -> Option<NaiveDate> {
        self.date
    }
}

impl From<fhir::EncounterData> for VisitRecord {
    fn from(data: fhir::EncounterData) -> Self {
        Self {
            id: data.id,
            date: data.date,
        }
    }
}

impl From<fhir::AppointmentData> for AppointmentRecord {
    fn from(data: fhir::AppointmentData) -> Self {
        let cancelled = data.is_cancelled();
        Self {
            id: data.id,
            date: data.start,
            cancelled,
        }
    }
}

/// Parses a JSON array of visit records (`[{"id": .., "date": ..}]`).
pub fn visits_from_json(json: &str) -> crate::CredResult<Vec<VisitRecord>> {
    serde_json::from_str(json).map_err(crate::CredError::Deserialization)
}

/// Parses a JSON array of appointment records (`[{"id": .., "date": .., "cancelled": ..}]`).
pub fn appointments_from_json(json: &str) -> crate::CredResult<Vec<AppointmentRecord>> {
    serde_json::from_str(json).map_err(crate::CredError::Deserialization)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_json_allows_missing_date() {
        let visits = visits_from_json(r#"[{"id": "v1", "date": "2024-01-03"}, {"id": "v2"}]"#)
            .expect("parse visits");
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].record_date(), NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(visits[1].record_date(), None);
    }

    #[test]
    fn appointment_json_defaults_to_not_cancelled() {
        let appts = appointments_from_json(
            r#"[{"id": "a1", "date": "2024-02-01"}, {"id": "a2", "date": "2024-03-01", "cancelled": true}]"#,
        )
        .expect("parse appointments");
        assert!(!appts[0].cancelled);
        assert!(appts[1].cancelled);
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = visits_from_json("{not json").expect_err("should fail");
        assert!(matches!(err, crate::CredError::Deserialization(_)));
    }

    #[test]
    fn converts_fhir_appointment_status() {
        let data = fhir::AppointmentData {
            id: "a9".into(),
            start: NaiveDate::from_ymd_opt(2024, 5, 1),
            status: fhir::AppointmentStatus::Cancelled,
        };
        let record = AppointmentRecord::from(data);
        assert!(record.cancelled);
        assert_eq!(record.id, "a9");
    }

    #[test]
    fn entered_in_error_appointment_frees_its_slot() {
        let data = fhir::AppointmentData {
            id: "a10".into(),
            start: NaiveDate::from_ymd_opt(2024, 5, 1),
            status: fhir::AppointmentStatus::EnteredInError,
        };
        assert!(AppointmentRecord::from(data).cancelled);
    }
}
