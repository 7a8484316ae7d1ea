//! Constants used throughout the CRED core crate.

/// Number of controls in the national CRED schedule.
///
/// Used as the fixed denominator for progress views, independent of how many
/// slots a particular computation produced.
pub const CATALOG_SIZE: usize = 33;

/// Default appointment length in minutes.
pub const DEFAULT_APPOINTMENT_DURATION_MINUTES: u32 = 30;

/// Default time-of-day (hour, minute) at which booked controls start.
pub const DEFAULT_APPOINTMENT_START: (u32, u32) = (8, 0);

/// Default number of upcoming controls booked in one batch.
pub const DEFAULT_LOOKAHEAD: usize = 3;

/// Prefix of the free-text comment attached to booked appointments.
pub const APPOINTMENT_COMMENT_PREFIX: &str = "CRED control";
