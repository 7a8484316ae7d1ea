//! FHIR wire/boundary support for the CRED scheduler.
//!
//! This crate provides **wire models** and **translation helpers** for the FHIR R4 JSON
//! exchanged with the clinical record server:
//! - `Encounter` search bundles (completed visits)
//! - `Appointment` search bundles (booked visits)
//! - `Appointment` creation payloads and responses
//! - next-page links of paged search bundles
//!
//! Reads are lenient: resources of other types are skipped and unusable dates become `None`.
//! Only a bundle that cannot be read at all is an error. No HTTP here; transport lives in
//! `api-rest`.

pub mod appointment;
pub mod encounter;

// Re-export facades
pub use appointment::{AppointmentCreate, Appointments};
pub use encounter::Encounters;

// Re-export public domain-level types
pub use appointment::{AppointmentCreateData, AppointmentData, AppointmentStatus};
pub use encounter::{EncounterData, EncounterStatus};

use chrono::NaiveDate;
use serde::Deserialize;

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

// ============================================================================
// Shared bundle handling (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct BundleWire {
    #[serde(rename = "resourceType")]
    resource_type: String,
    #[serde(default)]
    entry: Vec<BundleEntryWire>,
    #[serde(default)]
    link: Vec<BundleLinkWire>,
}

#[derive(Debug, Deserialize)]
struct BundleLinkWire {
    #[serde(default)]
    relation: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct BundleEntryWire {
    #[serde(default)]
    resource: Option<serde_json::Value>,
}

/// Parse a search bundle and return the raw resources of `resource_type`.
///
/// Uses `serde_path_to_error` so a schema mismatch names the failing JSON path.
fn bundle_resources(json: &str, resource_type: &str) -> FhirResult<Vec<serde_json::Value>> {
    let bundle = read_bundle(json, resource_type)?;
    Ok(bundle
        .entry
        .into_iter()
        .filter_map(|entry| entry.resource)
        .filter(|resource| {
            resource.get("resourceType").and_then(serde_json::Value::as_str) == Some(resource_type)
        })
        .collect())
}

/// URL of the next page of a search bundle (`link` with relation `next`), if any.
///
/// # Errors
///
/// Returns [`FhirError::Translation`] if the text is not a FHIR `Bundle`.
pub fn bundle_next_link(json: &str) -> FhirResult<Option<String>> {
    let bundle = read_bundle(json, "search")?;
    Ok(bundle
        .link
        .into_iter()
        .find(|link| link.relation == "next")
        .map(|link| link.url)
        .filter(|url| !url.trim().is_empty()))
}

fn read_bundle(json: &str, label: &str) -> FhirResult<BundleWire> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    let bundle: BundleWire = match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(parsed) => parsed,
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            return Err(FhirError::Translation(format!(
                "{label} bundle schema mismatch at {path}: {source}"
            )));
        }
    };

    if bundle.resource_type != "Bundle" {
        return Err(FhirError::Translation(format!(
            "expected resourceType Bundle, received {}",
            bundle.resource_type
        )));
    }

    Ok(bundle)
}

/// Calendar date of a FHIR `date` or `dateTime` value, as written.
///
/// Partial dates (`2024`, `2024-01`) and malformed values yield `None`.
pub fn parse_fhir_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
