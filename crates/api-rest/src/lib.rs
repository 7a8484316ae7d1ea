//! # API REST
//!
//! REST API for the CRED scheduler.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//! - The HTTP client for the FHIR record server ([`client::FhirHttpClient`])
//!
//! Scheduling logic lives in `cred-core`; handlers only resolve `today`, call the core and map
//! errors to status codes.

#![warn(rust_2018_idioms)]

pub mod client;

use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use cred_core::{
    checkup_definitions, reconcile, AppointmentBatch, AppointmentRecord, BatchItemError,
    BookingClient, BookingError, CancellationToken, CheckupDefinition, CheckupStatus,
    ClassifiedCheckup, CreatedAppointment, CredConfig, CredSchedule, CredService, MatchedRecord,
    Phase, RecordSource, ScheduleSummary, ScheduledCheckup, VisitRecord,
};

pub use client::FhirHttpClient;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    cred_service: CredService<dyn RecordSource>,
    booking_client: Arc<dyn BookingClient>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Builds handler state.
    ///
    /// `shutdown` is cancelled when the server stops; running booking batches then stop
    /// issuing further requests.
    pub fn new(
        cfg: Arc<CredConfig>,
        source: Arc<dyn RecordSource>,
        booking_client: Arc<dyn BookingClient>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cred_service: CredService::new(cfg, source),
            booking_client,
            shutdown,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Offline schedule computation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ComputeScheduleReq {
    pub birth_date: NaiveDate,
    /// Defaults to the server's local date.
    #[serde(default)]
    pub today: Option<NaiveDate>,
    #[serde(default)]
    pub visits: Vec<VisitRecord>,
    #[serde(default)]
    pub appointments: Vec<AppointmentRecord>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PatientScheduleQuery {
    pub birth_date: NaiveDate,
    /// Defaults to the server's local date.
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookAppointmentsReq {
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub today: Option<NaiveDate>,
    /// Number of upcoming unmatched controls to book; server default when absent.
    #[serde(default)]
    pub lookahead: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookAppointmentsRes {
    pub batch_id: String,
    #[serde(flatten)]
    pub batch: AppointmentBatch,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        catalog,
        compute_schedule,
        patient_schedule,
        book_appointments,
    ),
    components(schemas(
        HealthRes,
        ComputeScheduleReq,
        BookAppointmentsReq,
        BookAppointmentsRes,
        CheckupDefinition,
        Phase,
        ScheduledCheckup,
        CheckupStatus,
        MatchedRecord,
        ClassifiedCheckup,
        ScheduleSummary,
        CredSchedule,
        VisitRecord,
        AppointmentRecord,
        AppointmentBatch,
        CreatedAppointment,
        BatchItemError,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cred/catalog", get(catalog))
        .route("/cred/schedule", post(compute_schedule))
        .route("/patients/:id/cred", get(patient_schedule))
        .route("/patients/:id/cred/appointments", post(book_appointments))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn today_or_local(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| chrono::Local::now().date_naive())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "CRED scheduler is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/cred/catalog",
    responses(
        (status = 200, description = "CRED checkup definitions in control order", body = [CheckupDefinition])
    )
)]
/// List the CRED checkup catalog.
#[axum::debug_handler]
async fn catalog(State(_state): State<AppState>) -> Json<Vec<CheckupDefinition>> {
    Json(checkup_definitions().to_vec())
}

#[utoipa::path(
    post,
    path = "/cred/schedule",
    request_body = ComputeScheduleReq,
    responses(
        (status = 200, description = "Classified schedule", body = CredSchedule),
        (status = 422, description = "Malformed request body")
    )
)]
/// Compute a classified schedule from records supplied in the request.
///
/// No records are fetched; this is the pure reconciliation over the posted visits and
/// appointments. Cancelled appointments in the body are ignored.
#[axum::debug_handler]
async fn compute_schedule(
    State(_state): State<AppState>,
    Json(req): Json<ComputeScheduleReq>,
) -> Json<CredSchedule> {
    let today = today_or_local(req.today);
    Json(reconcile(req.birth_date, &req.visits, &req.appointments, today))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/cred",
    params(
        ("id" = String, Path, description = "Patient id on the FHIR server"),
        PatientScheduleQuery
    ),
    responses(
        (status = 200, description = "Classified schedule", body = CredSchedule),
        (status = 502, description = "Record source unavailable")
    )
)]
/// Fetch a patient's encounters and appointments and return the classified schedule.
///
/// # Errors
/// Returns `502 Bad Gateway` if the FHIR server cannot be read.
#[axum::debug_handler]
async fn patient_schedule(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<PatientScheduleQuery>,
) -> Result<Json<CredSchedule>, (StatusCode, &'static str)> {
    let today = today_or_local(query.today);
    match state
        .cred_service
        .schedule_for(&id, query.birth_date, today)
        .await
    {
        Ok(schedule) => Ok(Json(schedule)),
        Err(e) => {
            tracing::error!("CRED schedule error for patient {}: {:?}", id, e);
            Err((StatusCode::BAD_GATEWAY, "Record source error"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/patients/{id}/cred/appointments",
    params(
        ("id" = String, Path, description = "Patient id on the FHIR server")
    ),
    request_body = BookAppointmentsReq,
    responses(
        (status = 200, description = "Per-control booking outcome", body = BookAppointmentsRes),
        (status = 422, description = "Booking service or location not configured"),
        (status = 502, description = "Record source unavailable")
    )
)]
/// Book the next unmatched CRED controls for a patient.
///
/// Reconciles the patient's records first, then books the lookahead selection one control at
/// a time. Individual booking failures are reported in the response body, not as an error
/// status.
///
/// # Errors
/// Returns `422 Unprocessable Entity` when booking is not configured and `502 Bad Gateway`
/// when the FHIR server cannot be read.
#[axum::debug_handler]
async fn book_appointments(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<BookAppointmentsReq>,
) -> Result<Json<BookAppointmentsRes>, (StatusCode, &'static str)> {
    let today = today_or_local(req.today);
    let schedule = match state
        .cred_service
        .schedule_for(&id, req.birth_date, today)
        .await
    {
        Ok(schedule) => schedule,
        Err(e) => {
            tracing::error!("CRED schedule error for patient {}: {:?}", id, e);
            return Err((StatusCode::BAD_GATEWAY, "Record source error"));
        }
    };

    let batch_id = uuid::Uuid::new_v4().to_string();
    tracing::info!("-- CRED booking batch {} for patient {}", batch_id, id);

    match state
        .cred_service
        .book_upcoming(
            state.booking_client.as_ref(),
            &id,
            &schedule,
            req.lookahead,
            &state.shutdown,
        )
        .await
    {
        Ok(batch) => Ok(Json(BookAppointmentsRes { batch_id, batch })),
        Err(
            e @ (BookingError::MissingServiceId
            | BookingError::MissingLocation
            | BookingError::InvalidDuration
            | BookingError::MissingPatientId),
        ) => {
            tracing::warn!("CRED booking refused for patient {}: {}", id, e);
            Err((StatusCode::UNPROCESSABLE_ENTITY, "Booking not configured"))
        }
        Err(e) => {
            tracing::error!("CRED booking error for patient {}: {:?}", id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}
