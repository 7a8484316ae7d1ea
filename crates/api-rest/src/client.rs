//! HTTP client for the FHIR record server.
//!
//! One client serves both directions: it reads a patient's `Encounter` and `Appointment`
//! bundles for reconciliation and posts new `Appointment` resources for booking.

use std::time::Duration;

use async_trait::async_trait;
use cred_core::{
    AppointmentRecord, AppointmentRequest, BookingClient, BookingError, CredError, CredResult,
    RecordSource, VisitRecord,
};
use fhir::{AppointmentCreate, AppointmentCreateData, Appointments, Encounters};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;

const FHIR_JSON: &str = "application/fhir+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Page size asked of the server for record searches.
const SEARCH_PAGE_SIZE: &str = "200";
/// Upper bound on `next` links followed for one search.
const MAX_SEARCH_PAGES: usize = 50;

/// FHIR REST client used as record source and booking service.
#[derive(Clone, Debug)]
pub struct FhirHttpClient {
    http: reqwest::Client,
    base_url: String,
    encounter_type: Option<String>,
    service_type: Option<String>,
}

impl FhirHttpClient {
    /// Creates a client for the FHIR server at `base_url` (for example `https://ehr/fhir/R4`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            encounter_type: None,
            service_type: None,
        })
    }

    /// Only read encounters of this type (`type=` search parameter).
    pub fn with_encounter_type(mut self, encounter_type: Option<String>) -> Self {
        self.encounter_type = encounter_type;
        self
    }

    /// Only read appointments of this service type (`service-type=` search parameter).
    pub fn with_service_type(mut self, service_type: Option<String>) -> Self {
        self.service_type = service_type;
        self
    }

    fn url(&self, resource_type: &str) -> String {
        format!("{}/{resource_type}", self.base_url)
    }

    /// Runs a search and returns the body of every page, following `next` links.
    async fn search(&self, resource_type: &str, params: &[(&str, &str)]) -> CredResult<Vec<String>> {
        let first = self.http.get(self.url(resource_type)).query(params);
        let mut body = self.fetch(resource_type, first).await?;
        let mut pages = Vec::new();

        loop {
            let next = fhir::bundle_next_link(&body)?;
            pages.push(body);
            let Some(next) = next else {
                break;
            };
            if pages.len() >= MAX_SEARCH_PAGES {
                tracing::warn!(
                    resource_type,
                    pages = pages.len(),
                    "search has more pages than allowed; remaining records ignored"
                );
                break;
            }
            tracing::debug!(resource_type, page = pages.len() + 1, "following next link");
            body = self.fetch(resource_type, self.http.get(next)).await?;
        }

        Ok(pages)
    }

    async fn fetch(&self, resource_type: &str, request: RequestBuilder) -> CredResult<String> {
        let response = request
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await
            .map_err(|e| CredError::Source(format!("{resource_type} search failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredError::Source(format!(
                "{resource_type} search returned {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| CredError::Source(format!("{resource_type} search body unreadable: {e}")))
    }
}

#[async_trait]
impl RecordSource for FhirHttpClient {
    async fn visits(&self, patient_id: &str) -> CredResult<Vec<VisitRecord>> {
        let mut params = vec![
            ("patient", patient_id),
            ("status", "finished"),
            ("_count", SEARCH_PAGE_SIZE),
        ];
        if let Some(encounter_type) = self.encounter_type.as_deref() {
            params.push(("type", encounter_type));
        }

        let mut visits = Vec::new();
        for page in self.search("Encounter", &params).await? {
            // Servers may ignore the status parameter; filter again on our side.
            let encounters = Encounters::parse_finished(&page)?;
            visits.extend(encounters.into_iter().map(VisitRecord::from));
        }
        Ok(visits)
    }

    async fn appointments(&self, patient_id: &str) -> CredResult<Vec<AppointmentRecord>> {
        let mut params = vec![("patient", patient_id), ("_count", SEARCH_PAGE_SIZE)];
        if let Some(service_type) = self.service_type.as_deref() {
            params.push(("service-type", service_type));
        }

        let mut appointments = Vec::new();
        for page in self.search("Appointment", &params).await? {
            let parsed = Appointments::parse_bundle(&page)?;
            appointments.extend(parsed.into_iter().map(AppointmentRecord::from));
        }
        Ok(appointments)
    }
}

#[async_trait]
impl BookingClient for FhirHttpClient {
    async fn create_appointment(&self, request: &AppointmentRequest) -> Result<String, BookingError> {
        let payload = AppointmentCreate::render(&AppointmentCreateData::from(request))
            .map_err(|e| BookingError::Rejected(e.to_string()))?;

        let response = self
            .http
            .post(self.url("Appointment"))
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .body(payload)
            .send()
            .await
            .map_err(|e| BookingError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BookingError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(BookingError::Rejected(format!("server returned {status}")));
        }

        AppointmentCreate::parse_created_id(&body).map_err(|e| BookingError::Rejected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Params = HashMap<String, String>;

    /// Requests seen by the local FHIR server.
    #[derive(Clone, Default)]
    struct Seen {
        queries: Arc<Mutex<Vec<Params>>>,
        bodies: Arc<Mutex<Vec<Value>>>,
    }

    #[derive(Clone)]
    struct FakeFhir {
        base_url: String,
        seen: Seen,
    }

    /// Serves `routes` on an ephemeral port and returns the FHIR base URL.
    async fn serve(seen: Seen, routes: fn() -> Router<FakeFhir>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{addr}/fhir");
        let app = routes().with_state(FakeFhir {
            base_url: base_url.clone(),
            seen,
        });
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        base_url
    }

    fn encounter(id: &str, status: &str, start: &str) -> Value {
        json!({"resource": {"resourceType": "Encounter", "id": id, "status": status,
                            "period": {"start": start}}})
    }

    async fn encounter_pages(
        State(fake): State<FakeFhir>,
        Query(params): Query<Params>,
    ) -> (StatusCode, String) {
        let page_two = params.get("page").map(String::as_str) == Some("2");
        fake.seen.queries.lock().expect("lock").push(params);
        let bundle = if page_two {
            json!({
                "resourceType": "Bundle",
                "entry": [encounter("enc-4", "finished", "2024-01-15")]
            })
        } else {
            json!({
                "resourceType": "Bundle",
                "link": [{"relation": "next",
                          "url": format!("{}/Encounter?patient=p1&page=2", fake.base_url)}],
                "entry": [
                    encounter("enc-1", "finished", "2024-01-03"),
                    encounter("enc-2", "planned", "2024-01-08"),
                    encounter("enc-3", "cancelled", "2024-01-15")
                ]
            })
        };
        (StatusCode::OK, bundle.to_string())
    }

    async fn appointment_search(
        State(fake): State<FakeFhir>,
        Query(params): Query<Params>,
    ) -> (StatusCode, String) {
        fake.seen.queries.lock().expect("lock").push(params);
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Appointment", "id": "a1", "status": "booked",
                              "start": "2024-02-01T08:00:00-05:00"}},
                {"resource": {"resourceType": "Appointment", "id": "a2", "status": "cancelled",
                              "start": "2024-03-01T08:00:00-05:00"}},
                {"resource": {"resourceType": "Appointment", "id": "a3",
                              "status": "entered-in-error", "start": "2024-04-01T08:00:00-05:00"}}
            ]
        });
        (StatusCode::OK, bundle.to_string())
    }

    async fn server_error() -> (StatusCode, String) {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom".into())
    }

    async fn accept_appointment(
        State(fake): State<FakeFhir>,
        body: String,
    ) -> (StatusCode, String) {
        let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        fake.seen.bodies.lock().expect("lock").push(payload);
        let created = json!({"resourceType": "Appointment", "id": "new-1", "status": "booked"});
        (StatusCode::CREATED, created.to_string())
    }

    async fn reject_appointment() -> (StatusCode, String) {
        let outcome = json!({"resourceType": "OperationOutcome", "issue": []});
        (StatusCode::BAD_REQUEST, outcome.to_string())
    }

    fn search_routes() -> Router<FakeFhir> {
        Router::new()
            .route("/fhir/Encounter", get(encounter_pages))
            .route("/fhir/Appointment", get(appointment_search).post(accept_appointment))
    }

    fn failing_routes() -> Router<FakeFhir> {
        Router::new()
            .route("/fhir/Encounter", get(server_error))
            .route("/fhir/Appointment", post(reject_appointment))
    }

    fn booking_request() -> AppointmentRequest {
        let lima = FixedOffset::west_opt(5 * 3600).expect("offset");
        let at = |h, m| {
            lima.with_ymd_and_hms(2024, 1, 3, h, m, 0)
                .single()
                .expect("instant")
        };
        AppointmentRequest {
            patient_id: "p1".into(),
            service_id: "svc-cred".into(),
            location_id: "loc-1".into(),
            start: at(8, 0),
            end: at(8, 30),
            comment: "CRED control 1: RN 48 horas".into(),
        }
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = FhirHttpClient::new("http://ehr.test/fhir/R4/").expect("client");
        assert_eq!(client.url("Encounter"), "http://ehr.test/fhir/R4/Encounter");
    }

    #[tokio::test]
    async fn visits_follow_next_links_and_keep_finished_encounters() {
        let seen = Seen::default();
        let base_url = serve(seen.clone(), search_routes).await;
        let client = FhirHttpClient::new(base_url)
            .expect("client")
            .with_encounter_type(Some("cred-visit".into()));

        let visits = client.visits("p1").await.expect("visits");

        let ids: Vec<&str> = visits.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["enc-1", "enc-4"]);

        let queries = seen.queries.lock().expect("lock");
        assert_eq!(queries.len(), 2);
        let first = &queries[0];
        assert_eq!(first.get("patient").map(String::as_str), Some("p1"));
        assert_eq!(first.get("_count").map(String::as_str), Some("200"));
        assert_eq!(first.get("type").map(String::as_str), Some("cred-visit"));
        assert_eq!(first.get("status").map(String::as_str), Some("finished"));
        assert_eq!(queries[1].get("page").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn appointments_filter_by_service_type_and_void_statuses() {
        let seen = Seen::default();
        let base_url = serve(seen.clone(), search_routes).await;
        let client = FhirHttpClient::new(base_url)
            .expect("client")
            .with_service_type(Some("svc-cred".into()));

        let appointments = client.appointments("p1").await.expect("appointments");

        let cancelled: Vec<(&str, bool)> = appointments
            .iter()
            .map(|a| (a.id.as_str(), a.cancelled))
            .collect();
        assert_eq!(cancelled, vec![("a1", false), ("a2", true), ("a3", true)]);

        let queries = seen.queries.lock().expect("lock");
        assert_eq!(
            queries[0].get("service-type").map(String::as_str),
            Some("svc-cred")
        );
        assert_eq!(queries[0].get("type"), None);
    }

    #[tokio::test]
    async fn search_error_status_is_a_source_error() {
        let base_url = serve(Seen::default(), failing_routes).await;
        let client = FhirHttpClient::new(base_url).expect("client");

        let err = client.visits("p1").await.expect_err("should fail");
        match err {
            CredError::Source(msg) => assert!(msg.contains("500"), "{msg}"),
            other => panic!("expected Source error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_posts_offset_instants_and_reads_id() {
        let seen = Seen::default();
        let base_url = serve(seen.clone(), search_routes).await;
        let client = FhirHttpClient::new(base_url).expect("client");

        let id = client
            .create_appointment(&booking_request())
            .await
            .expect("created");
        assert_eq!(id, "new-1");

        let bodies = seen.bodies.lock().expect("lock");
        assert_eq!(bodies[0]["resourceType"], "Appointment");
        assert_eq!(bodies[0]["start"], "2024-01-03T08:00:00-05:00");
        assert_eq!(bodies[0]["end"], "2024-01-03T08:30:00-05:00");
        assert_eq!(bodies[0]["participant"][0]["actor"]["reference"], "Patient/p1");
    }

    #[tokio::test]
    async fn create_client_error_is_rejected() {
        let base_url = serve(Seen::default(), failing_routes).await;
        let client = FhirHttpClient::new(base_url).expect("client");

        let err = client
            .create_appointment(&booking_request())
            .await
            .expect_err("should be rejected");
        match err {
            BookingError::Rejected(msg) => assert!(msg.contains("400"), "{msg}"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        let client = FhirHttpClient::new(format!("http://{addr}/fhir")).expect("client");

        let err = client
            .create_appointment(&booking_request())
            .await
            .expect_err("nothing listening");
        assert!(matches!(err, BookingError::Transport(_)));

        let err = client.visits("p1").await.expect_err("nothing listening");
        assert!(matches!(err, CredError::Source(_)));
    }
}
