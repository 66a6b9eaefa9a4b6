//! Direct HTTP channel against an in-process consent management mock.

mod common;

use std::time::Duration;

use authflow_e2e::http::{HttpClient, HttpMethod, HttpRequest};
use authflow_e2e::E2eError;
use common::{record, spawn_mock};

fn client() -> HttpClient {
    HttpClient::new(Duration::from_secs(5), true).unwrap()
}

#[tokio::test]
async fn import_then_delete_by_id_and_all() {
    let (addr, store) = spawn_mock().await;
    let base = format!("http://{}/cas/actuator/attributeConsent", addr);
    let http = client();

    for id in [1, 2] {
        let import = HttpRequest::new(HttpMethod::Post, format!("{}/import", base))
            .header("Content-Type", "application/json")
            .expect(201)
            .body(record(id));
        let response = http.request(&import).await.unwrap();
        assert_eq!(response.status, 201);
    }

    let listed = http
        .request(&HttpRequest::new(HttpMethod::Get, format!("{}/casuser", base)))
        .await
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);

    http.request(&HttpRequest::new(HttpMethod::Delete, format!("{}/casuser/1", base)))
        .await
        .unwrap();
    assert_eq!(store.records.lock().unwrap().len(), 1);

    http.request(&HttpRequest::new(HttpMethod::Delete, format!("{}/casuser", base)))
        .await
        .unwrap();
    assert!(store.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn status_mismatch_is_reported_with_both_codes() {
    let (addr, _) = spawn_mock().await;
    let http = client();

    // Import answers 201; expecting the default 200 must fail
    let import = HttpRequest::new(
        HttpMethod::Post,
        format!("http://{}/cas/actuator/attributeConsent/import", addr),
    )
    .header("Content-Type", "application/json")
    .body(record(1));

    match http.request(&import).await {
        Err(E2eError::UnexpectedStatus { method, got, want, .. }) => {
            assert_eq!(method, "POST");
            assert_eq!(got, 201);
            assert_eq!(want, 200);
        }
        other => panic!("expected UnexpectedStatus, got {:?}", other),
    }

    let missing = HttpRequest::new(
        HttpMethod::Delete,
        format!("http://{}/cas/actuator/attributeConsent/casuser/42", addr),
    );
    let err = http.request(&missing).await.unwrap_err();
    assert_eq!(err.kind(), "unexpected_status");
}

#[tokio::test]
async fn export_streams_to_file() {
    let (addr, store) = spawn_mock().await;
    store
        .records
        .lock()
        .unwrap()
        .push(serde_json::from_str(&record(1)).unwrap());

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested").join("consent.zip");
    let export = HttpRequest::new(
        HttpMethod::Get,
        format!("http://{}/cas/actuator/attributeConsent/export", addr),
    );

    let written = client().download(&export, &dest).await.unwrap();
    let on_disk = std::fs::metadata(&dest).unwrap().len();
    assert_eq!(written, on_disk);
    assert!(written > 64 * 1024);
}

#[tokio::test]
async fn export_with_unexpected_status_writes_nothing() {
    let (addr, _) = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("consent.zip");
    let export = HttpRequest::new(
        HttpMethod::Get,
        format!("http://{}/cas/actuator/attributeConsent/nope/export", addr),
    );

    assert!(client().download(&export, &dest).await.is_err());
    assert!(!dest.exists());
}
