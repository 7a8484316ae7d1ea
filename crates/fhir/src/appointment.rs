//! FHIR `Appointment` read and write models.
//!
//! Reads turn an `Appointment` search bundle into id/start/status triples. Writes render the
//! creation payload for one booked CRED control and read back the id the server assigned.

use crate::{bundle_resources, parse_fhir_date, FhirError, FhirResult};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// FHIR appointment status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppointmentStatus {
    Proposed,
    Pending,
    Booked,
    Arrived,
    Fulfilled,
    Cancelled,
    Noshow,
    EnteredInError,
    CheckedIn,
    Waitlist,
    /// Missing or unrecognised code.
    Other,
}

impl AppointmentStatus {
    fn from_wire(s: &str) -> Self {
        match s {
            "proposed" => AppointmentStatus::Proposed,
            "pending" => AppointmentStatus::Pending,
            "booked" => AppointmentStatus::Booked,
            "arrived" => AppointmentStatus::Arrived,
            "fulfilled" => AppointmentStatus::Fulfilled,
            "cancelled" => AppointmentStatus::Cancelled,
            "noshow" => AppointmentStatus::Noshow,
            "entered-in-error" => AppointmentStatus::EnteredInError,
            "checked-in" => AppointmentStatus::CheckedIn,
            "waitlist" => AppointmentStatus::Waitlist,
            _ => AppointmentStatus::Other,
        }
    }
}

/// Domain-level carrier for one booked appointment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppointmentData {
    pub id: String,
    /// Calendar date of `start`, if present and readable.
    pub start: Option<NaiveDate>,
    pub status: AppointmentStatus,
}

impl AppointmentData {
    /// Cancelled or entered in error; neither holds a slot on the calendar.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Cancelled | AppointmentStatus::EnteredInError
        )
    }
}

/// Domain-level carrier for an appointment to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppointmentCreateData {
    pub patient_id: String,
    pub service_id: String,
    pub location_id: String,
    /// Start instant, with the clinic's UTC offset.
    pub start: DateTime<FixedOffset>,
    /// End instant, with the clinic's UTC offset.
    pub end: DateTime<FixedOffset>,
    pub comment: String,
}

// ============================================================================
// Public Appointment operations
// ============================================================================

/// Appointment bundle operations.
pub struct Appointments;

impl Appointments {
    /// Parse an `Appointment` search bundle.
    ///
    /// Entries without an `id` are skipped. A missing or unreadable `start` keeps the entry
    /// with `start: None`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] if the text is not a FHIR `Bundle`.
    pub fn parse_bundle(json: &str) -> FhirResult<Vec<AppointmentData>> {
        let resources = bundle_resources(json, "Appointment")?;
        Ok(resources
            .into_iter()
            .filter_map(|resource| serde_json::from_value::<AppointmentWire>(resource).ok())
            .filter_map(wire_to_domain)
            .collect())
    }
}

/// Appointment creation operations.
pub struct AppointmentCreate;

impl AppointmentCreate {
    /// Render the FHIR `Appointment` resource for a new booking.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if any identifier is blank or `end` is not after
    /// `start`, and [`FhirError::InvalidJson`] if serialisation fails.
    pub fn render(data: &AppointmentCreateData) -> FhirResult<String> {
        let wire = domain_to_wire(data)?;
        Ok(serde_json::to_string(&wire)?)
    }

    /// Extract the server-assigned id from a created `Appointment` resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidJson`] for unreadable JSON and
    /// [`FhirError::InvalidInput`] when the resource has no id.
    pub fn parse_created_id(json: &str) -> FhirResult<String> {
        let created: CreatedWire = serde_json::from_str(json)?;
        if created.resource_type.as_deref() != Some("Appointment") {
            return Err(FhirError::InvalidInput(
                "created resource is not an Appointment".into(),
            ));
        }
        created
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| FhirError::InvalidInput("created Appointment has no id".into()))
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct AppointmentWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedWire {
    #[serde(rename = "resourceType", default)]
    resource_type: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AppointmentCreateWire<'a> {
    #[serde(rename = "resourceType")]
    resource_type: &'static str,
    status: &'static str,
    #[serde(rename = "serviceType")]
    service_type: Vec<CodeableConceptWire<'a>>,
    start: String,
    end: String,
    comment: &'a str,
    participant: Vec<ParticipantWire>,
}

#[derive(Debug, Serialize)]
struct CodeableConceptWire<'a> {
    coding: Vec<CodingWire<'a>>,
}

#[derive(Debug, Serialize)]
struct CodingWire<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct ParticipantWire {
    actor: ReferenceWire,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ReferenceWire {
    reference: String,
}

fn wire_to_domain(wire: AppointmentWire) -> Option<AppointmentData> {
    let id = wire.id.filter(|id| !id.trim().is_empty())?;
    Some(AppointmentData {
        id,
        start: wire.start.as_deref().and_then(parse_fhir_date),
        status: wire
            .status
            .as_deref()
            .map(AppointmentStatus::from_wire)
            .unwrap_or(AppointmentStatus::Other),
    })
}

/// FHIR `instant`: seconds precision and an explicit offset.
fn fhir_instant(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn require<'a>(value: &'a str, field: &str) -> FhirResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FhirError::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(trimmed)
}

fn domain_to_wire(data: &AppointmentCreateData) -> FhirResult<AppointmentCreateWire<'_>> {
    let patient_id = require(&data.patient_id, "patient_id")?;
    let service_id = require(&data.service_id, "service_id")?;
    let location_id = require(&data.location_id, "location_id")?;
    if data.end <= data.start {
        return Err(FhirError::InvalidInput(
            "appointment end must be after start".into(),
        ));
    }

    Ok(AppointmentCreateWire {
        resource_type: "Appointment",
        status: "booked",
        service_type: vec![CodeableConceptWire {
            coding: vec![CodingWire { code: service_id }],
        }],
        start: fhir_instant(&data.start),
        end: fhir_instant(&data.end),
        comment: &data.comment,
        participant: vec![
            ParticipantWire {
                actor: ReferenceWire {
                    reference: format!("Patient/{patient_id}"),
                },
                status: "accepted",
            },
            ParticipantWire {
                actor: ReferenceWire {
                    reference: format!("Location/{location_id}"),
                },
                status: "accepted",
            },
        ],
    })
}
