// Integration tests: HTTP and WebSocket feed endpoints

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use sensorboard::config::AppConfig;
use sensorboard::coordinator::merge;
use sensorboard::history::HistoryView;
use sensorboard::models::Snapshot;
use sensorboard::routes;
use tokio::sync::watch;

const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[source]
base_url = "http://127.0.0.1:9"

[history]
window = 3

[map]
center_lat = 46.0
center_lng = 14.5
zoom = 11
marker_icon_url = "/icons/pin.png"
marker_icon_size = [20, 30]

[[devices]]
id = 1
name = "sensor-1"
lat = 46.01
lng = 14.5
resource = "sensor1.json"

[[devices]]
id = 2
name = "sensor-2"
lat = 46.02
lng = 14.5
resource = "sensor2.json"
"#;

fn test_app() -> (axum::Router, watch::Sender<Arc<Snapshot>>) {
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    let catalog = Arc::new(config.catalog());
    let (tx, rx) = watch::channel(Arc::new(Snapshot::initial(&catalog)));
    (routes::app(rx, catalog, config), tx)
}

fn loaded_snapshot(previous: &Snapshot) -> Snapshot {
    merge(
        previous,
        vec![
            (
                1,
                Ok((0..5).map(|m| common::reading(m, 20.0 + m as f64)).collect()),
            ),
            (2, Ok(vec![])),
        ],
    )
}

/// Build TestServer with http_transport (required for WebSocket tests).
fn test_server_with_http() -> (TestServer, watch::Sender<Arc<Snapshot>>) {
    let (app, tx) = test_app();
    let server = TestServer::builder().http_transport().build(app).unwrap();
    (server, tx)
}

#[tokio::test]
async fn test_root_endpoint() {
    let (app, _) = test_app();
    let server = TestServer::new(app).unwrap();
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("sensorboard: sensor feed is up");
}

#[tokio::test]
async fn test_version_endpoint() {
    let (app, _) = test_app();
    let server = TestServer::new(app).unwrap();
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("sensorboard")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_map_defaults_endpoint() {
    let (app, _) = test_app();
    let server = TestServer::new(app).unwrap();
    let json: serde_json::Value = server.get("/api/map").await.json();
    assert_eq!(json["zoom"], 11);
    assert_eq!(json["centerLat"], 46.0);
    assert_eq!(json["style"]["iconUrl"], "/icons/pin.png");
    assert_eq!(json["style"]["iconAnchor"], serde_json::json!([10, 30]));
}

#[tokio::test]
async fn test_snapshot_endpoint_starts_loading() {
    let (app, _) = test_app();
    let server = TestServer::new(app).unwrap();
    let json: serde_json::Value = server.get("/api/snapshot").await.json();
    assert_eq!(json["status"]["state"], "loading");
    assert_eq!(json["cycle"], 0);
    assert_eq!(json["series"]["1"]["readings"], serde_json::json!([]));
}

#[tokio::test]
async fn test_markers_endpoint_reflects_published_snapshot() {
    let (app, tx) = test_app();
    let server = TestServer::new(app).unwrap();

    let json: serde_json::Value = server.get("/api/markers").await.json();
    assert_eq!(json["banner"]["kind"], "loading");
    assert_eq!(json["markers"][0]["popup"]["noData"], true);

    let next = loaded_snapshot(&tx.borrow());
    tx.send_replace(Arc::new(next));

    let json: serde_json::Value = server.get("/api/markers").await.json();
    assert_eq!(json["cycle"], 1);
    assert!(json["banner"].is_null());
    let temp = &json["markers"][0]["popup"]["fields"][0];
    assert_eq!(temp["field"], "temperature");
    assert_eq!(temp["latest"], "24.0");
    assert_eq!(temp["min"], "22.0");
    assert_eq!(temp["points"].as_array().unwrap().len(), 3);
    assert_eq!(json["markers"][1]["popup"]["message"], "No data available");
}

#[tokio::test]
async fn test_device_history_endpoint() {
    let (app, tx) = test_app();
    let server = TestServer::new(app).unwrap();
    let next = loaded_snapshot(&tx.borrow());
    tx.send_replace(Arc::new(next));

    let view: HistoryView = server.get("/api/devices/1/history").await.json();
    assert_eq!(view.window.len(), 3);
    assert_eq!(view.latest.unwrap().temperature, 24.0);

    let view: HistoryView = server
        .get("/api/devices/1/history")
        .add_query_param("window", 10)
        .await
        .json();
    assert_eq!(view.window.len(), 5);
}

#[tokio::test]
async fn test_device_history_rejects_unknown_device_and_zero_window() {
    let (app, _) = test_app();
    let server = TestServer::new(app).unwrap();
    server
        .get("/api/devices/42/history")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/devices/1/history")
        .add_query_param("window", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// --- WebSocket message tests (require http_transport + ws feature) ---

#[tokio::test]
async fn test_ws_markers_sends_current_view_then_updates() {
    let (server, tx) = test_server_with_http();
    let mut ws = server
        .get_websocket("/ws/markers")
        .await
        .into_websocket()
        .await;

    let first: serde_json::Value = ws.receive_json().await;
    assert_eq!(first["cycle"], 0);
    assert_eq!(first["banner"]["kind"], "loading");

    let next = loaded_snapshot(&tx.borrow());
    tx.send_replace(Arc::new(next));

    let second: serde_json::Value = ws.receive_json().await;
    assert_eq!(second["cycle"], 1);
    assert_eq!(second["markers"][0]["label"], "sensor-1");
}
