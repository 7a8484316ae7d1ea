//! Core runtime configuration.
//!
//! Resolved once at process startup and then passed into services. Request handling never
//! reads environment variables.

use chrono::{FixedOffset, NaiveTime};

use crate::booking::BatchSettings;
use crate::constants::{
    DEFAULT_APPOINTMENT_DURATION_MINUTES, DEFAULT_APPOINTMENT_START, DEFAULT_LOOKAHEAD,
};
use crate::{CredError, CredResult};

/// CRED configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CredConfig {
    fhir_base_url: String,
    booking: BatchSettings,
    lookahead: usize,
    encounter_type: Option<String>,
}

impl CredConfig {
    /// Create a new `CredConfig`.
    ///
    /// The booking service id and location are optional here: without them the server still
    /// computes schedules, and only batch booking is refused.
    pub fn new(
        fhir_base_url: String,
        booking: BatchSettings,
        lookahead: usize,
    ) -> CredResult<Self> {
        let fhir_base_url = fhir_base_url.trim().trim_end_matches('/').to_string();
        if fhir_base_url.is_empty() {
            return Err(CredError::InvalidConfig(
                "FHIR base URL cannot be empty".into(),
            ));
        }
        if booking.duration_minutes == 0 {
            return Err(CredError::InvalidConfig(
                "appointment duration must be greater than zero".into(),
            ));
        }

        Ok(Self {
            fhir_base_url,
            booking,
            lookahead,
            encounter_type: None,
        })
    }

    /// Restrict visit searches to encounters of this type (a CRED visit type code).
    ///
    /// Blank values clear the restriction.
    pub fn with_encounter_type(mut self, encounter_type: Option<String>) -> Self {
        self.encounter_type = present(encounter_type);
        self
    }

    pub fn fhir_base_url(&self) -> &str {
        &self.fhir_base_url
    }

    pub fn booking(&self) -> &BatchSettings {
        &self.booking
    }

    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    pub fn encounter_type(&self) -> Option<&str> {
        self.encounter_type.as_deref()
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build booking settings from optional raw values (typically environment variables).
///
/// Missing values fall back to defaults; present but unparseable values are an error.
pub fn batch_settings_from_env_values(
    service_id: Option<String>,
    location_id: Option<String>,
    duration_minutes: Option<String>,
    start_time: Option<String>,
    utc_offset: Option<String>,
) -> CredResult<BatchSettings> {
    let duration_minutes = present(duration_minutes)
        .map(|v| {
            v.parse::<u32>().map_err(|_| {
                CredError::InvalidConfig(format!("invalid appointment duration: {v}"))
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_APPOINTMENT_DURATION_MINUTES);

    let start_time = match present(start_time) {
        Some(v) => NaiveTime::parse_from_str(&v, "%H:%M")
            .map_err(|_| CredError::InvalidConfig(format!("invalid appointment start time: {v}")))?,
        None => {
            let (hour, minute) = DEFAULT_APPOINTMENT_START;
            NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
                CredError::InvalidConfig("invalid default appointment start time".into())
            })?
        }
    };

    let utc_offset = present(utc_offset)
        .map(|v| {
            v.parse::<FixedOffset>()
                .map_err(|_| CredError::InvalidConfig(format!("invalid UTC offset: {v}")))
        })
        .transpose()?;

    Ok(BatchSettings {
        service_id: present(service_id),
        location_id: present(location_id),
        duration_minutes,
        start_time,
        utc_offset,
    })
}

/// Parse the lookahead count from an optional string value.
pub fn lookahead_from_env_value(value: Option<String>) -> CredResult<usize> {
    present(value)
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| CredError::InvalidConfig(format!("invalid lookahead: {v}")))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(DEFAULT_LOOKAHEAD))
}
