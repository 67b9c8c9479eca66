// GET handlers: version, map defaults, snapshot, markers, device history

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::AppState;
use crate::history::{self, HistoryView};
use crate::version::{DESCRIPTION, NAME, VERSION};
use crate::view::MarkerStyle;

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
        "description": DESCRIPTION,
    }))
}

/// GET /api/map: initial centre/zoom and the marker style.
pub(super) async fn api_map_handler(State(state): State<AppState>) -> impl IntoResponse {
    let map = &state.config.map;
    Json(serde_json::json!({
        "centerLat": map.center_lat,
        "centerLng": map.center_lng,
        "zoom": map.zoom,
        "style": MarkerStyle::from(map),
    }))
}

/// GET /api/snapshot: the latest published snapshot.
pub(super) async fn api_snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.snapshot().as_ref().clone())
}

/// GET /api/markers: render-ready markers plus the status banner.
pub(super) async fn api_markers_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.map_view().as_ref().clone())
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    window: Option<usize>,
}

/// GET /api/devices/{id}/history: windowed history for one device.
pub(super) async fn api_device_history_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryView>, (StatusCode, String)> {
    if state.catalog.get(id).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("unknown device {}", id)));
    }
    let window = query.window.unwrap_or(state.config.history.window);
    if window == 0 {
        return Err((StatusCode::BAD_REQUEST, "window must be > 0".into()));
    }
    let snapshot = state.snapshot();
    Ok(Json(history::project(snapshot.readings(id), window)))
}
