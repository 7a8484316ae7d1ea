use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState, FhirHttpClient};
use cred_core::config::{batch_settings_from_env_values, lookahead_from_env_value};
use cred_core::{CancellationToken, CredConfig};

/// Default log levels per crate target, extended by `RUST_LOG`.
const LOG_DIRECTIVES: &[&str] = &["cred=info", "api_rest=info"];

/// Main entry point for the CRED scheduler service
///
/// Resolves configuration once from the environment, then serves the REST API until Ctrl-C.
/// On shutdown, in-flight booking batches stop before their next request.
///
/// # Environment Variables
/// - `CRED_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CRED_FHIR_BASE_URL`: FHIR server base URL for records and booking (required)
/// - `CRED_BOOKING_SERVICE_ID`: appointment service id (booking refused when unset)
/// - `CRED_BOOKING_LOCATION_ID`: appointment location id (booking refused when unset)
/// - `CRED_APPOINTMENT_DURATION_MINUTES`: appointment length (default: 30)
/// - `CRED_APPOINTMENT_START_TIME`: start time of booked controls, `HH:MM` (default: "08:00")
/// - `CRED_APPOINTMENT_UTC_OFFSET`: clinic UTC offset such as `-05:00` (default: server local time)
/// - `CRED_ENCOUNTER_TYPE`: encounter type code of CRED visits (default: any type)
/// - `CRED_LOOKAHEAD`: controls booked per batch when the request gives none (default: 3)
///
/// # Errors
/// Returns an error if configuration is invalid, the address cannot be bound, or the server
/// fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in LOG_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CRED_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let fhir_base_url = std::env::var("CRED_FHIR_BASE_URL")
        .map_err(|_| anyhow::anyhow!("CRED_FHIR_BASE_URL must be set"))?;

    let booking = batch_settings_from_env_values(
        std::env::var("CRED_BOOKING_SERVICE_ID").ok(),
        std::env::var("CRED_BOOKING_LOCATION_ID").ok(),
        std::env::var("CRED_APPOINTMENT_DURATION_MINUTES").ok(),
        std::env::var("CRED_APPOINTMENT_START_TIME").ok(),
        std::env::var("CRED_APPOINTMENT_UTC_OFFSET").ok(),
    )?;
    let lookahead = lookahead_from_env_value(std::env::var("CRED_LOOKAHEAD").ok())?;

    if booking.service_id.is_none() || booking.location_id.is_none() {
        tracing::warn!("Booking service or location not configured; CRED booking is disabled");
    }

    let cfg = Arc::new(
        CredConfig::new(fhir_base_url, booking, lookahead)?
            .with_encounter_type(std::env::var("CRED_ENCOUNTER_TYPE").ok()),
    );
    if cfg.encounter_type().is_none() {
        tracing::warn!("CRED_ENCOUNTER_TYPE not set; every finished encounter counts as a CRED visit");
    }
    let fhir_client = Arc::new(
        FhirHttpClient::new(cfg.fhir_base_url())?
            .with_encounter_type(cfg.encounter_type().map(str::to_string))
            .with_service_type(cfg.booking().service_id.clone()),
    );
    let shutdown = CancellationToken::new();

    let state = AppState::new(
        cfg.clone(),
        fhir_client.clone(),
        fhir_client,
        shutdown.clone(),
    );
    let app = router(state);

    tracing::info!("++ Starting CRED REST on {}", rest_addr);
    tracing::info!("++ FHIR server at {}", cfg.fhir_base_url());

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("-- Shutting down CRED REST");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
