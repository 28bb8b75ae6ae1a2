// Data source tests against a local stand-in for the spreadsheet API and snapshot host

mod common;

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
};
use common::{day_rows, serve, values_body};
use meterwatch::config::{SourceConfig, SourceKind};
use meterwatch::source::{self, DataSource, SheetsSource, SnapshotSource};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Captured = Arc<Mutex<Option<(String, String, HashMap<String, String>)>>>;

fn sheets_api(captured: Captured) -> Router {
    Router::new().route(
        "/v4/spreadsheets/{id}/values/{range}",
        get(
            move |Path((id, range)): Path<(String, String)>,
                  Query(query): Query<HashMap<String, String>>| async move {
                *captured.lock().unwrap() = Some((id, range, query));
                Json(values_body(&day_rows()))
            },
        ),
    )
}

fn sheets_source(base_url: &str) -> SheetsSource {
    SheetsSource::new(
        reqwest::Client::new(),
        base_url,
        "sheet-123",
        "secret-key",
        "ProcessedData!A:O",
    )
}

#[tokio::test]
async fn test_sheets_source_requests_unformatted_rows() {
    let captured: Captured = Arc::default();
    let base = serve(sheets_api(captured.clone())).await;

    let rows = sheets_source(&base).fetch_all_rows().await.expect("rows");
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0][0], Value::from("2024-05-01 10:00:00"));

    let (id, range, query) = captured.lock().unwrap().take().expect("request seen");
    assert_eq!(id, "sheet-123");
    assert_eq!(range, "ProcessedData!A:O");
    assert_eq!(query["key"], "secret-key");
    assert_eq!(query["majorDimension"], "ROWS");
    assert_eq!(query["valueRenderOption"], "UNFORMATTED_VALUE");
}

#[tokio::test]
async fn test_sheets_source_non_success_status_is_no_data() {
    let app = Router::new().route(
        "/v4/spreadsheets/{id}/values/{range}",
        get(|| async { (StatusCode::FORBIDDEN, "API key not valid") }),
    );
    let base = serve(app).await;
    assert!(sheets_source(&base).fetch_all_rows().await.is_none());
}

#[tokio::test]
async fn test_sheets_source_malformed_body_is_no_data() {
    let app = Router::new().route(
        "/v4/spreadsheets/{id}/values/{range}",
        get(|| async { "<html>not json</html>" }),
    );
    let base = serve(app).await;
    assert!(sheets_source(&base).fetch_all_rows().await.is_none());
}

#[tokio::test]
async fn test_sheets_source_unreachable_host_is_no_data() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let source = sheets_source(&format!("http://{addr}"));
    assert!(source.fetch_all_rows().await.is_none());
}

#[tokio::test]
async fn test_sheets_source_timeout_is_no_data() {
    let app = Router::new().route(
        "/v4/spreadsheets/{id}/values/{range}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(values_body(&day_rows()))
        }),
    );
    let base = serve(app).await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let source = SheetsSource::new(client, &base, "id", "key", "A:O");

    let started = std::time::Instant::now();
    assert!(source.fetch_all_rows().await.is_none());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_snapshot_over_http_sends_cache_buster() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let app = Router::new().route(
        "/data/energy-data.json",
        get({
            let seen = seen.clone();
            move |Query(query): Query<HashMap<String, String>>| async move {
                seen.lock().unwrap().extend(query.get("t").cloned());
                Json(values_body(&day_rows()))
            }
        }),
    );
    let base = serve(app).await;
    let source = SnapshotSource::new(
        reqwest::Client::new(),
        &format!("{base}/data/energy-data.json"),
    );

    assert_eq!(source.fetch_all_rows().await.expect("rows").len(), 4);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].parse::<i64>().is_ok());
}

#[tokio::test]
async fn test_snapshot_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(values_body(&day_rows()).to_string().as_bytes())
        .unwrap();
    let source = SnapshotSource::new(reqwest::Client::new(), file.path().to_str().unwrap());
    assert_eq!(source.fetch_all_rows().await.expect("rows").len(), 4);
}

#[tokio::test]
async fn test_snapshot_header_only_is_empty_not_missing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(values_body(&[]).to_string().as_bytes())
        .unwrap();
    let source = SnapshotSource::new(reqwest::Client::new(), file.path().to_str().unwrap());
    assert_eq!(source.fetch_all_rows().await, Some(Vec::new()));
}

#[tokio::test]
async fn test_snapshot_missing_file_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("energy-data.json");
    let source = SnapshotSource::new(reqwest::Client::new(), path.to_str().unwrap());
    assert!(source.fetch_all_rows().await.is_none());
}

#[tokio::test]
async fn test_from_config_builds_configured_backend() {
    let config = SourceConfig {
        kind: SourceKind::Snapshot,
        sheet_id: String::new(),
        api_key: String::new(),
        base_url: "https://sheets.googleapis.com".into(),
        range: "ProcessedData!A:O".into(),
        snapshot_location: "./data/energy-data.json".into(),
        fetch_timeout_secs: 10,
    };
    assert_eq!(source::from_config(&config).unwrap().name(), "snapshot");

    let config = SourceConfig {
        kind: SourceKind::Sheets,
        ..config
    };
    assert_eq!(source::from_config(&config).unwrap().name(), "sheets");
}
