//! FHIR `Encounter` read models.
//!
//! Completed visits come from an `Encounter` search bundle. Only the identifier, the status and
//! the calendar date of `period.start` matter for scheduling.

use crate::{bundle_resources, parse_fhir_date, FhirResult};
use chrono::NaiveDate;
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// FHIR encounter status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncounterStatus {
    Planned,
    Arrived,
    Triaged,
    InProgress,
    Onleave,
    Finished,
    Cancelled,
    EnteredInError,
    Unknown,
    /// Missing or unrecognised code.
    Other,
}

impl EncounterStatus {
    fn from_wire(s: &str) -> Self {
        match s {
            "planned" => EncounterStatus::Planned,
            "arrived" => EncounterStatus::Arrived,
            "triaged" => EncounterStatus::Triaged,
            "in-progress" => EncounterStatus::InProgress,
            "onleave" => EncounterStatus::Onleave,
            "finished" => EncounterStatus::Finished,
            "cancelled" => EncounterStatus::Cancelled,
            "entered-in-error" => EncounterStatus::EnteredInError,
            "unknown" => EncounterStatus::Unknown,
            _ => EncounterStatus::Other,
        }
    }
}

/// Domain-level carrier for one visit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncounterData {
    /// Logical id of the Encounter resource.
    pub id: String,
    /// Calendar date of `period.start`, if present and readable.
    pub date: Option<NaiveDate>,
    pub status: EncounterStatus,
}

impl EncounterData {
    /// Whether the visit actually took place.
    pub fn is_finished(&self) -> bool {
        self.status == EncounterStatus::Finished
    }
}

// ============================================================================
// Public Encounter operations
// ============================================================================

/// Encounter bundle operations.
///
/// Zero-sized namespace type; all methods are associated functions.
pub struct Encounters;

impl Encounters {
    /// Parse an `Encounter` search bundle.
    ///
    /// Entries that are not Encounters, or that have no `id`, are skipped. A missing or
    /// unreadable `period.start` keeps the entry with `date: None`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError::Translation`] if the text is not a FHIR `Bundle`.
    pub fn parse_bundle(json: &str) -> FhirResult<Vec<EncounterData>> {
        let resources = bundle_resources(json, "Encounter")?;
        Ok(resources
            .into_iter()
            .filter_map(|resource| serde_json::from_value::<EncounterWire>(resource).ok())
            .filter_map(wire_to_domain)
            .collect())
    }

    /// Parse an `Encounter` search bundle, keeping only finished encounters.
    ///
    /// Planned, in-progress, cancelled and entered-in-error encounters are not visits that
    /// happened and must never complete a control.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError::Translation`] if the text is not a FHIR `Bundle`.
    pub fn parse_finished(json: &str) -> FhirResult<Vec<EncounterData>> {
        let mut encounters = Self::parse_bundle(json)?;
        encounters.retain(EncounterData::is_finished);
        Ok(encounters)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct EncounterWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    period: Option<PeriodWire>,
}

#[derive(Debug, Deserialize)]
struct PeriodWire {
    #[serde(default)]
    start: Option<String>,
}

fn wire_to_domain(wire: EncounterWire) -> Option<EncounterData> {
    let id = wire.id.filter(|id| !id.trim().is_empty())?;
    let date = wire
        .period
        .and_then(|period| period.start)
        .and_then(|start| parse_fhir_date(&start));
    let status = wire
        .status
        .as_deref()
        .map(EncounterStatus::from_wire)
        .unwrap_or(EncounterStatus::Other);
    Some(EncounterData { id, date, status })
}
