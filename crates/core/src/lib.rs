//! # CRED Core
//!
//! Well-child (CRED, *Crecimiento y Desarrollo*) checkup scheduling.
//!
//! This crate contains the pure scheduling logic and the booking boundary:
//! - The static 33-control catalog and per-child schedule generation
//! - Greedy matching of visits and appointments to schedule slots
//! - Status classification and summary views
//! - Batch appointment creation through a [`BookingClient`]
//!
//! **No transport concerns**: HTTP servers and clients live in `api-rest`; FHIR wire formats
//! live in the `fhir` crate.

pub mod booking;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod matching;
pub mod records;
pub mod schedule;
pub mod service;
pub mod summary;

pub use booking::{
    create_appointments, AppointmentBatch, AppointmentRequest, BatchItemError, BatchSettings,
    BookingClient, BookingError, CancellationToken, CreatedAppointment,
};
pub use catalog::{checkup_definitions, CheckupDefinition, Phase};
pub use classify::{classify, CheckupStatus, ClassifiedCheckup, MatchedRecord};
pub use config::CredConfig;
pub use constants::CATALOG_SIZE;
pub use error::{CredError, CredResult};
pub use matching::{match_appointments, match_encounters, Matches};
pub use records::{AppointmentRecord, RecordMatch, VisitRecord};
pub use schedule::{generate_schedule, ScheduledCheckup};
pub use service::{reconcile, CredSchedule, CredService, RecordSource};
pub use summary::{lookahead, ScheduleSummary};
