/// Errors returned by the CRED core.
///
/// Schedule generation, matching and classification are total functions and never
/// produce these; they come from configuration and from external record sources.
#[derive(Debug, thiserror::Error)]
pub enum CredError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("record source failed: {0}")]
    Source(String),
    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
    #[error("failed to deserialize records: {0}")]
    Deserialization(serde_json::Error),
}

pub type CredResult<T> = std::result::Result<T, CredError>;
