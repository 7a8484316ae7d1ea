//! Appointment batch creation.
//!
//! Books one appointment per selected control through an external booking service. Requests
//! are issued one at a time; a failing request is recorded against its control and the batch
//! moves on. Only configuration problems abort the whole batch, and they do so before any
//! request is sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::classify::ClassifiedCheckup;
use crate::constants::{
    APPOINTMENT_COMMENT_PREFIX, DEFAULT_APPOINTMENT_DURATION_MINUTES, DEFAULT_APPOINTMENT_START,
};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("no booking service id configured")]
    MissingServiceId,
    #[error("no booking location configured")]
    MissingLocation,
    #[error("patient id is required")]
    MissingPatientId,
    #[error("appointment duration must be greater than zero")]
    InvalidDuration,
    #[error("appointment time out of range for control {0}")]
    TimeOutOfRange(u32),
    #[error("booking rejected: {0}")]
    Rejected(String),
    #[error("booking transport failed: {0}")]
    Transport(String),
}

/// A single appointment-creation request sent to the booking service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppointmentRequest {
    pub patient_id: String,
    pub service_id: String,
    pub location_id: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub comment: String,
}

impl From<&AppointmentRequest> for fhir::AppointmentCreateData {
    fn from(request: &AppointmentRequest) -> Self {
        Self {
            patient_id: request.patient_id.clone(),
            service_id: request.service_id.clone(),
            location_id: request.location_id.clone(),
            start: request.start,
            end: request.end,
            comment: request.comment.clone(),
        }
    }
}

/// External service that books appointments one at a time.
#[async_trait]
pub trait BookingClient: Send + Sync {
    /// Creates the appointment and returns its identifier.
    async fn create_appointment(&self, request: &AppointmentRequest) -> Result<String, BookingError>;
}

/// Booking parameters shared by every request in a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchSettings {
    pub service_id: Option<String>,
    pub location_id: Option<String>,
    pub duration_minutes: u32,
    /// Time of day at which each control's appointment starts.
    pub start_time: NaiveTime,
    /// UTC offset of the clinic. `None` uses the server's local timezone for each date.
    pub utc_offset: Option<FixedOffset>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        let (hour, minute) = DEFAULT_APPOINTMENT_START;
        Self {
            service_id: None,
            location_id: None,
            duration_minutes: DEFAULT_APPOINTMENT_DURATION_MINUTES,
            start_time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
            utc_offset: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CreatedAppointment {
    pub control_number: u32,
    pub appointment_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct BatchItemError {
    pub control_number: u32,
    pub error: String,
}

/// Per-control outcome of a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AppointmentBatch {
    pub created: Vec<CreatedAppointment>,
    pub errors: Vec<BatchItemError>,
    /// Controls never attempted because the batch was cancelled.
    pub skipped: Vec<u32>,
}

impl AppointmentBatch {
    /// Identifiers of the created appointments, in input order.
    pub fn created_ids(&self) -> Vec<&str> {
        self.created
            .iter()
            .map(|c| c.appointment_id.as_str())
            .collect()
    }
}

/// Cooperative cancellation flag shared between a batch and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct ValidatedSettings<'a> {
    patient_id: &'a str,
    service_id: &'a str,
    location_id: &'a str,
    duration: TimeDelta,
    start_time: NaiveTime,
    utc_offset: Option<FixedOffset>,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn validate<'a>(
    patient_id: &'a str,
    settings: &'a BatchSettings,
) -> Result<ValidatedSettings<'a>, BookingError> {
    let patient_id = patient_id.trim();
    if patient_id.is_empty() {
        return Err(BookingError::MissingPatientId);
    }
    let service_id =
        non_blank(settings.service_id.as_ref()).ok_or(BookingError::MissingServiceId)?;
    let location_id =
        non_blank(settings.location_id.as_ref()).ok_or(BookingError::MissingLocation)?;
    if settings.duration_minutes == 0 {
        return Err(BookingError::InvalidDuration);
    }

    Ok(ValidatedSettings {
        patient_id,
        service_id,
        location_id,
        duration: TimeDelta::minutes(i64::from(settings.duration_minutes)),
        start_time: settings.start_time,
        utc_offset: settings.utc_offset,
    })
}

/// Pins a clinic wall-clock time to an instant.
///
/// Returns `None` for local times that do not exist (DST gaps) or fall off the calendar.
fn to_instant(
    wall_clock: NaiveDateTime,
    utc_offset: Option<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let offset = match utc_offset {
        Some(offset) => offset,
        None => *Local.from_local_datetime(&wall_clock).earliest()?.offset(),
    };
    offset.from_local_datetime(&wall_clock).single()
}

fn build_request(
    settings: &ValidatedSettings<'_>,
    control: &ClassifiedCheckup,
) -> Result<AppointmentRequest, BookingError> {
    let definition = &control.checkup.definition;
    let wall_clock = control.checkup.target_date.and_time(settings.start_time);
    let start = to_instant(wall_clock, settings.utc_offset)
        .ok_or(BookingError::TimeOutOfRange(definition.control_number))?;
    let end = start
        .checked_add_signed(settings.duration)
        .ok_or(BookingError::TimeOutOfRange(definition.control_number))?;

    Ok(AppointmentRequest {
        patient_id: settings.patient_id.to_string(),
        service_id: settings.service_id.to_string(),
        location_id: settings.location_id.to_string(),
        start,
        end,
        comment: format!(
            "{APPOINTMENT_COMMENT_PREFIX} {}: {}",
            definition.control_number, definition.label
        ),
    })
}

/// Books an appointment for each control, in order.
///
/// The caller chooses which controls to book (see [`crate::summary::lookahead`]). Each
/// appointment starts on the control's target date at `settings.start_time`, in the clinic's
/// `settings.utc_offset`, and lasts `settings.duration_minutes`.
///
/// # Errors
///
/// Returns an error without contacting the booking service when the patient id, service id or
/// location is missing, or the duration is zero. Failures of individual requests are reported
/// in [`AppointmentBatch::errors`] instead.
pub async fn create_appointments<C>(
    client: &C,
    patient_id: &str,
    controls: &[ClassifiedCheckup],
    settings: &BatchSettings,
    cancel: &CancellationToken,
) -> Result<AppointmentBatch, BookingError>
where
    C: BookingClient + ?Sized,
{
    let validated = validate(patient_id, settings)?;
    let mut batch = AppointmentBatch::default();

    for (idx, control) in controls.iter().enumerate() {
        if cancel.is_cancelled() {
            batch
                .skipped
                .extend(controls[idx..].iter().map(ClassifiedCheckup::control_number));
            warn!(
                patient_id = validated.patient_id,
                skipped = batch.skipped.len(),
                "appointment batch cancelled"
            );
            break;
        }

        let control_number = control.control_number();
        let outcome = match build_request(&validated, control) {
            Ok(request) => client.create_appointment(&request).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(appointment_id) => {
                info!(
                    patient_id = validated.patient_id,
                    control_number,
                    appointment_id = appointment_id.as_str(),
                    "CRED appointment created"
                );
                batch.created.push(CreatedAppointment {
                    control_number,
                    appointment_id,
                });
            }
            Err(err) => {
                warn!(
                    patient_id = validated.patient_id,
                    control_number,
                    error = %err,
                    "CRED appointment failed"
                );
                batch.errors.push(BatchItemError {
                    control_number,
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(batch)
}
