//! Shared fixtures for wiremock-driven integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use visara_client::{Dataset, PollConfig, VisaraClient};

pub const DATASET_ID: &str = "bc41491e-78ae-11ef-ba4b-8a774758b536";

pub fn dataset_id() -> Uuid {
    DATASET_ID.parse().unwrap()
}

/// Polling cadence fast enough for tests to finish in milliseconds.
pub fn fast_poll() -> PollConfig {
    PollConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_millis(250))
}

pub fn dataset_row(status: &str) -> Value {
    json!({
        "id": DATASET_ID,
        "display_name": "wildlife",
        "status": status,
        "created_at": "2026-08-01T10:00:00",
        "n_images": 4
    })
}

/// Mount the details endpoint used by handle validation and export gating.
pub async fn mock_dataset_details(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/dataset/{DATASET_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(dataset_row(status)))
        .mount(server)
        .await;
}

/// Mount the account configuration endpoint with explicit search flags.
pub async fn mock_user_config(server: &MockServer, labels: bool, captions: bool, semantic: bool) {
    Mock::given(method("GET"))
        .and(path("/user_config"))
        .and(query_param("dataset_id", DATASET_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [{
                "feature_key": "TEXTUAL_SEARCH_IMAGE",
                "feature_options": {
                    "labels_search": labels,
                    "captions_search": captions,
                    "semantic_search": semantic
                }
            }]
        })))
        .mount(server)
        .await;
}

/// Export manifest with one bare media item per id.
pub fn manifest(media_ids: &[&str]) -> Value {
    let items: Vec<Value> = media_ids
        .iter()
        .map(|id| json!({"media_id": id, "file_name": format!("{id}.jpg"), "metadata_items": []}))
        .collect();
    json!({"media_items": items})
}

/// Mount the synchronous full-export endpoint.
pub async fn mock_full_export(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/dataset/{DATASET_ID}/export")))
        .and(query_param("export_format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount a submit endpoint that completes immediately, publishing
/// `download_path` on the mock server, and the download itself.
pub async fn mock_search_completing_at(server: &MockServer, download_path: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/dataset/{DATASET_ID}/export_context_async")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "task-1",
            "status": "COMPLETED",
            "download_uri": format!("{}{download_path}", server.uri())
        })))
        .mount(server)
        .await;
    mock_download(server, download_path, body).await;
}

/// Mount a JSON download body at `download_path`.
pub async fn mock_download(server: &MockServer, download_path: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(download_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Open a validated handle against the mock server with fast polling.
///
/// Callers must have mounted the details endpoint first.
pub async fn open_dataset(server: &MockServer) -> Dataset {
    let client = VisaraClient::with_base_url("test-key", "test-secret", server.uri());
    client
        .dataset(dataset_id())
        .await
        .expect("dataset handle should open against the mock server")
        .with_poll_config(fast_poll())
}

/// Media ids of a row batch, in order.
pub fn ids(records: &[visara_core::MediaRecord]) -> Vec<&str> {
    records.iter().map(|r| r.media_id.as_str()).collect()
}
