// HTTP + WebSocket feed for the map surface

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::models::{DeviceCatalog, Snapshot};
use crate::view::{MapView, MarkerStyle, ViewAdapter, ViewCache};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshots: watch::Receiver<Arc<Snapshot>>,
    pub(crate) catalog: Arc<DeviceCatalog>,
    pub(crate) views: Arc<Mutex<ViewCache>>,
    pub(crate) config: AppConfig,
}

impl AppState {
    pub(crate) fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    /// Current map view; the same `Arc` until a new snapshot is published.
    pub(crate) fn map_view(&self) -> Arc<MapView> {
        let snapshot = self.snapshot();
        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        views.view(&self.catalog, &snapshot)
    }
}

pub fn app(
    snapshots: watch::Receiver<Arc<Snapshot>>,
    catalog: Arc<DeviceCatalog>,
    config: AppConfig,
) -> Router {
    let adapter = ViewAdapter::new(MarkerStyle::from(&config.map), config.history.window);
    let state = AppState {
        snapshots,
        catalog,
        views: Arc::new(Mutex::new(ViewCache::new(adapter))),
        config,
    };
    Router::new()
        .route("/", get(|| async { "sensorboard: sensor feed is up" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/map", get(http::api_map_handler)) // GET /api/map
        .route("/api/snapshot", get(http::api_snapshot_handler)) // GET /api/snapshot
        .route("/api/markers", get(http::api_markers_handler)) // GET /api/markers
        .route(
            "/api/devices/{id}/history",
            get(http::api_device_history_handler),
        ) // GET /api/devices/{id}/history?window=N
        .route("/ws/markers", get(ws::ws_markers)) // WS /ws/markers
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
