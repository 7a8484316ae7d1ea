//! End-to-end reconciliation of a child's CRED schedule.
//!
//! Ties the pure pieces together: schedule generation, the two matcher passes, status
//! classification and the summary. [`CredService`] adds record retrieval through a
//! [`RecordSource`] and the booking step.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::booking::{
    create_appointments, AppointmentBatch, BookingClient, BookingError, CancellationToken,
};
use crate::classify::{classify, ClassifiedCheckup};
use crate::config::CredConfig;
use crate::matching::{match_appointments, match_encounters, matched_controls};
use crate::records::{AppointmentRecord, VisitRecord};
use crate::schedule::generate_schedule;
use crate::summary::{lookahead, ScheduleSummary};
use crate::CredResult;

/// Classified schedule plus its summary, for one child at one point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CredSchedule {
    pub birth_date: NaiveDate,
    pub today: NaiveDate,
    pub checkups: Vec<ClassifiedCheckup>,
    pub summary: ScheduleSummary,
}

/// Computes the classified schedule from raw records.
///
/// Cancelled appointments are removed here, before matching. Records without a date are
/// dropped by the matchers.
pub fn reconcile(
    birth_date: NaiveDate,
    visits: &[VisitRecord],
    appointments: &[AppointmentRecord],
    today: NaiveDate,
) -> CredSchedule {
    let schedule = generate_schedule(birth_date);

    let encounter_matches = match_encounters(&schedule, visits);
    let completed = matched_controls(&encounter_matches);

    let active: Vec<AppointmentRecord> = appointments
        .iter()
        .filter(|appt| !appt.cancelled)
        .cloned()
        .collect();
    let appointment_matches = match_appointments(&schedule, &active, &completed);

    debug!(
        visits = visits.len(),
        appointments = active.len(),
        completed = encounter_matches.len(),
        scheduled = appointment_matches.len(),
        "CRED schedule reconciled"
    );

    let checkups = classify(&schedule, &encounter_matches, &appointment_matches, today);
    let summary = ScheduleSummary::from_classified(&checkups);

    CredSchedule {
        birth_date,
        today,
        checkups,
        summary,
    }
}

/// Source of a patient's visit and appointment records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn visits(&self, patient_id: &str) -> CredResult<Vec<VisitRecord>>;
    async fn appointments(&self, patient_id: &str) -> CredResult<Vec<AppointmentRecord>>;
}

/// Fetches records for a patient and reconciles them against the CRED schedule.
pub struct CredService<S: ?Sized> {
    cfg: Arc<CredConfig>,
    source: Arc<S>,
}

impl<S: ?Sized> Clone for CredService<S> {
    fn clone(&self) -> Self {
        Self {
            cfg: Arc::clone(&self.cfg),
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: RecordSource + ?Sized> CredService<S> {
    pub fn new(cfg: Arc<CredConfig>, source: Arc<S>) -> Self {
        Self { cfg, source }
    }

    pub fn config(&self) -> &CredConfig {
        &self.cfg
    }

    /// Builds the classified schedule for `patient_id` as of `today`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CredError`] if either record fetch fails.
    pub async fn schedule_for(
        &self,
        patient_id: &str,
        birth_date: NaiveDate,
        today: NaiveDate,
    ) -> CredResult<CredSchedule> {
        let visits = self.source.visits(patient_id).await?;
        let appointments = self.source.appointments(patient_id).await?;
        Ok(reconcile(birth_date, &visits, &appointments, today))
    }

    /// Books the next `count` unmatched controls (configured lookahead when `None`).
    ///
    /// # Errors
    ///
    /// Configuration errors from the batch creator are returned as-is; per-control failures
    /// are part of the returned batch.
    pub async fn book_upcoming<C>(
        &self,
        client: &C,
        patient_id: &str,
        schedule: &CredSchedule,
        count: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<AppointmentBatch, BookingError>
    where
        C: BookingClient + ?Sized,
    {
        let count = count.unwrap_or_else(|| self.cfg.lookahead());
        let selected = lookahead(&schedule.checkups, count);
        info!(
            patient_id,
            selected = selected.len(),
            "booking upcoming CRED controls"
        );
        create_appointments(client, patient_id, &selected, self.cfg.booking(), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{AppointmentRequest, BatchSettings};
    use crate::classify::CheckupStatus;
    use crate::CredError;
    use chrono::Days;
    use std::sync::Mutex;

    fn birth() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")
    }

    fn day(offset: u64) -> NaiveDate {
        birth().checked_add_days(Days::new(offset)).expect("date")
    }

    #[test]
    fn reconcile_without_data() {
        let schedule = reconcile(birth(), &[], &[], day(100));
        assert_eq!(schedule.checkups.len(), 33);
        assert_eq!(schedule.summary.completed_count, 0);
        assert_eq!(schedule.summary.overdue.len(), 7);
        assert_eq!(schedule.summary.next_due_control(), Some(1));
        assert!(schedule.checkups[7..]
            .iter()
            .all(|c| c.status == CheckupStatus::Future));
    }

    #[test]
    fn cancelled_appointments_do_not_match() {
        let appointments = vec![
            AppointmentRecord {
                id: "cancelled".into(),
                date: Some(day(60)),
                cancelled: true,
            },
            AppointmentRecord {
                id: "active".into(),
                date: Some(day(90)),
                cancelled: false,
            },
        ];
        let schedule = reconcile(birth(), &[], &appointments, day(40));

        assert_eq!(schedule.checkups[5].status, CheckupStatus::Future);
        assert_eq!(schedule.checkups[6].status, CheckupStatus::Scheduled);
        assert_eq!(
            schedule.checkups[6].matched.as_ref().map(|m| m.id()),
            Some("active")
        );
    }

    #[test]
    fn unfinished_fhir_encounters_do_not_complete_controls() {
        let bundle = r#"{
  "resourceType": "Bundle",
  "entry": [
    {"resource": {"resourceType": "Encounter", "id": "seen", "status": "finished",
                  "period": {"start": "2024-01-03T09:00:00-05:00"}}},
    {"resource": {"resourceType": "Encounter", "id": "planned", "status": "planned",
                  "period": {"start": "2024-01-08"}}},
    {"resource": {"resourceType": "Encounter", "id": "cancelled", "status": "cancelled",
                  "period": {"start": "2024-01-15"}}}
  ]
}"#;
        let visits: Vec<VisitRecord> = fhir::Encounters::parse_finished(bundle)
            .expect("parse bundle")
            .into_iter()
            .map(VisitRecord::from)
            .collect();

        let today = NaiveDate::from_ymd_opt(2024, 2, 1).expect("date");
        let schedule = reconcile(birth(), &visits, &[], today);

        assert_eq!(schedule.checkups[0].status, CheckupStatus::Completed);
        assert_eq!(schedule.checkups[1].status, CheckupStatus::Overdue);
        assert_eq!(schedule.checkups[2].status, CheckupStatus::Overdue);
        assert_eq!(schedule.summary.completed_count, 1);
    }

    #[test]
    fn visit_and_appointment_on_same_slot_is_completed() {
        let visits = vec![VisitRecord {
            id: "v".into(),
            date: Some(day(30)),
        }];
        let appointments = vec![AppointmentRecord {
            id: "a".into(),
            date: Some(day(30)),
            cancelled: false,
        }];
        let schedule = reconcile(birth(), &visits, &appointments, day(31));

        assert_eq!(schedule.checkups[4].status, CheckupStatus::Completed);
        // The appointment moves to the nearest free slot (control 4, day 21).
        assert_eq!(schedule.checkups[3].status, CheckupStatus::Scheduled);

        let ids: Vec<&str> = schedule
            .checkups
            .iter()
            .filter_map(|c| c.matched.as_ref().map(|m| m.id()))
            .collect();
        assert_eq!(ids, vec!["a", "v"]);
    }

    #[test]
    fn reconcile_is_repeatable() {
        let visits = vec![VisitRecord {
            id: "v".into(),
            date: Some(day(65)),
        }];
        let first = serde_json::to_string(&reconcile(birth(), &visits, &[], day(200)))
            .expect("serialize");
        let second = serde_json::to_string(&reconcile(birth(), &visits, &[], day(200)))
            .expect("serialize");
        assert_eq!(first, second);
    }

    struct StaticSource {
        visits: Vec<VisitRecord>,
        fail: bool,
    }

    #[async_trait]
    impl RecordSource for StaticSource {
        async fn visits(&self, _patient_id: &str) -> CredResult<Vec<VisitRecord>> {
            if self.fail {
                return Err(CredError::Source("unreachable".into()));
            }
            Ok(self.visits.clone())
        }

        async fn appointments(&self, _patient_id: &str) -> CredResult<Vec<AppointmentRecord>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingBooking {
        requests: Mutex<Vec<AppointmentRequest>>,
    }

    #[async_trait]
    impl BookingClient for RecordingBooking {
        async fn create_appointment(
            &self,
            request: &AppointmentRequest,
        ) -> Result<String, BookingError> {
            let mut requests = self.requests.lock().expect("lock");
            requests.push(request.clone());
            Ok(format!("created-{}", requests.len()))
        }
    }

    fn config() -> Arc<CredConfig> {
        let booking = BatchSettings {
            service_id: Some("svc".into()),
            location_id: Some("loc".into()),
            ..BatchSettings::default()
        };
        Arc::new(CredConfig::new("http://fhir.test".into(), booking, 2).expect("config"))
    }

    #[tokio::test]
    async fn schedule_for_uses_source_records() {
        let source = Arc::new(StaticSource {
            visits: vec![VisitRecord {
                id: "v1".into(),
                date: Some(day(2)),
            }],
            fail: false,
        });
        let service = CredService::new(config(), source);

        let schedule = service
            .schedule_for("p1", birth(), day(10))
            .await
            .expect("schedule");
        assert_eq!(schedule.checkups[0].status, CheckupStatus::Completed);
        assert_eq!(schedule.summary.next_due_control(), Some(2));
    }

    #[tokio::test]
    async fn source_failure_is_propagated() {
        let source = Arc::new(StaticSource {
            visits: Vec::new(),
            fail: true,
        });
        let service = CredService::new(config(), source);
        let err = service
            .schedule_for("p1", birth(), day(10))
            .await
            .expect_err("should fail");
        assert!(matches!(err, CredError::Source(_)));
    }

    #[tokio::test]
    async fn book_upcoming_uses_configured_lookahead() {
        let source = Arc::new(StaticSource {
            visits: vec![VisitRecord {
                id: "v1".into(),
                date: Some(day(2)),
            }],
            fail: false,
        });
        let service = CredService::new(config(), source);
        let schedule = service
            .schedule_for("p1", birth(), day(10))
            .await
            .expect("schedule");
        let client = RecordingBooking::default();

        let batch = service
            .book_upcoming(&client, "p1", &schedule, None, &CancellationToken::new())
            .await
            .expect("batch");

        assert_eq!(batch.created.len(), 2);
        assert_eq!(batch.created[0].control_number, 2);
        assert_eq!(batch.created[1].control_number, 3);
    }
}
