//! RestStore against a mocked portal backend.

use certflow_storage::{
    ApplicationFilter, ApplicationStore, CertificateStore, QueryWindow, RestStore, StorageError,
};
use certflow_types::{
    ActorId, ApplicantDetails, Application, ApplicationId, Certificate, CertificateId,
    IssuingOfficer, Stage,
};
use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_application() -> Application {
    Application::new(
        ActorId::new("applicant-1"),
        ApplicantDetails::new("Lakshmi Devi", "123412341234", "BC-A"),
        Stage::Svro,
        Utc::now(),
    )
    .with_id(ApplicationId::new("app-1"))
}

fn make_certificate() -> Certificate {
    let now = Utc::now();
    Certificate {
        id: CertificateId::new("cert-1"),
        application_id: ApplicationId::new("app-1"),
        serial_number: "CC-2026-ABCDEF012345".into(),
        applicant: ApplicantDetails::new("Lakshmi Devi", "123412341234", "BC-A"),
        holder: ActorId::new("applicant-1"),
        issuing_officer: IssuingOfficer {
            id: ActorId::new("mro-1"),
            name: "Srinivas".into(),
        },
        issued_at: now,
        valid_until: now + Duration::days(365),
        document_digest: "00".into(),
        media_type: "application/json".into(),
        renewal_of: None,
    }
}

fn store_for(server: &MockServer) -> RestStore {
    RestStore::new(&server.uri(), StdDuration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn get_application_decodes_record() {
    let server = MockServer::start().await;
    let app = make_application();
    Mock::given(method("GET"))
        .and(path("/applications/app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&app))
        .mount(&server)
        .await;

    let fetched = store_for(&server)
        .get_application(&ApplicationId::new("app-1"))
        .await
        .unwrap();
    assert_eq!(fetched, Some(app));
}

#[tokio::test]
async fn missing_application_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetched = store_for(&server)
        .get_application(&ApplicationId::new("nope"))
        .await
        .unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn ids_with_reserved_characters_stay_in_one_segment() {
    let server = MockServer::start().await;
    let cert = make_certificate();
    Mock::given(method("GET"))
        .and(path("/certificates/cert-1%2F..%2Fadmin%3Fall=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&cert))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = store_for(&server)
        .get_certificate(&CertificateId::new("cert-1/../admin?all=1"))
        .await
        .unwrap();
    assert_eq!(fetched, Some(cert));
}

#[tokio::test]
async fn put_sends_expected_version() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/applications/app-1"))
        .and(body_partial_json(serde_json::json!({ "expected_version": 4 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server)
        .put_application(&make_application(), 4)
        .await
        .unwrap();
}

#[tokio::test]
async fn put_conflict_is_stale() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/applications/app-1"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(serde_json::json!({ "current_version": 7 })),
        )
        .mount(&server)
        .await;

    let result = store_for(&server)
        .put_application(&make_application(), 5)
        .await;
    assert!(matches!(
        result,
        Err(StorageError::Stale {
            expected: 5,
            found: 7,
            ..
        })
    ));
}

#[tokio::test]
async fn server_error_is_transient_backend_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/applications/app-1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .put_application(&make_application(), 0)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn list_passes_filter_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications"))
        .and(query_param("stage", "MVRO"))
        .and(query_param("status", "PENDING"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![make_application()]))
        .mount(&server)
        .await;

    let listed = store_for(&server)
        .list_applications(&ApplicationFilter::pending_at(Stage::Mvro), QueryWindow::first(10))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn insert_certificate_returns_stored_record() {
    let server = MockServer::start().await;
    let existing = make_certificate();
    Mock::given(method("POST"))
        .and(path("/applications/app-1/certificate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&existing))
        .mount(&server)
        .await;

    let mut duplicate = make_certificate();
    duplicate.id = CertificateId::new("cert-2");
    let stored = store_for(&server)
        .insert_certificate(duplicate)
        .await
        .unwrap();
    assert_eq!(stored.id, CertificateId::new("cert-1"));
}

#[tokio::test]
async fn unreachable_backend_is_backend_error() {
    let store = RestStore::new("http://127.0.0.1:9", StdDuration::from_millis(200)).unwrap();
    let result = store.get_application(&ApplicationId::new("app-1")).await;
    assert!(matches!(result, Err(StorageError::Backend(_))));
}
