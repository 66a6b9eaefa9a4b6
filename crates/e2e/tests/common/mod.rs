//! In-process stand-in for the consent management endpoints.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Default)]
pub struct ConsentStore {
    pub records: Mutex<Vec<Value>>,
    /// `X-Ticket` header of every import, in order
    pub tickets: Mutex<Vec<String>>,
}

pub type Store = Arc<ConsentStore>;

async fn list(State(store): State<Store>, Path(principal): Path<String>) -> Json<Value> {
    let records = store.records.lock().unwrap();
    let mine: Vec<Value> = records
        .iter()
        .filter(|r| r["principal"] == principal.as_str())
        .cloned()
        .collect();
    Json(Value::Array(mine))
}

async fn import(State(store): State<Store>, headers: HeaderMap, Json(record): Json<Value>) -> StatusCode {
    if let Some(ticket) = headers.get("x-ticket").and_then(|v| v.to_str().ok()) {
        store.tickets.lock().unwrap().push(ticket.to_string());
    }
    store.records.lock().unwrap().push(record);
    StatusCode::CREATED
}

async fn export(State(store): State<Store>) -> Vec<u8> {
    // Large enough to arrive in several chunks
    let records = store.records.lock().unwrap();
    let mut body = Vec::new();
    for _ in 0..2048 {
        body.extend_from_slice(serde_json::to_string(&*records).unwrap().as_bytes());
    }
    body
}

async fn delete_one(
    State(store): State<Store>,
    Path((principal, id)): Path<(String, u64)>,
) -> StatusCode {
    let mut records = store.records.lock().unwrap();
    let before = records.len();
    records.retain(|r| !(r["principal"] == principal.as_str() && r["id"] == id));
    if records.len() < before {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn delete_all(State(store): State<Store>, Path(principal): Path<String>) -> StatusCode {
    store
        .records
        .lock()
        .unwrap()
        .retain(|r| r["principal"] != principal.as_str());
    StatusCode::OK
}

/// Accepts only an empty body; answers with the refreshed keys.
async fn refresh(body: Bytes) -> (StatusCode, Json<Value>) {
    if body.is_empty() {
        (StatusCode::OK, Json(json!([])))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "unexpected body" })))
    }
}

pub async fn spawn_mock() -> (SocketAddr, Store) {
    let store: Store = Arc::default();
    let app = Router::new()
        .route("/cas/actuator/refresh", post(refresh))
        .route("/cas/actuator/attributeConsent/import", post(import))
        .route("/cas/actuator/attributeConsent/export", get(export))
        .route(
            "/cas/actuator/attributeConsent/:principal",
            get(list).delete(delete_all),
        )
        .route(
            "/cas/actuator/attributeConsent/:principal/:id",
            delete(delete_one),
        )
        .with_state(store.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, store)
}

pub fn record(id: u64) -> String {
    json!({
        "id": id,
        "principal": "casuser",
        "service": "https://example.org",
        "reminder": 14,
        "reminderTimeUnit": "DAYS"
    })
    .to_string()
}
