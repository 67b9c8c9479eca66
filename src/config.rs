use std::collections::HashSet;

use serde::Deserialize;

use crate::models::{Device, DeviceCatalog, LatLng};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub map: MapConfig,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Remote store root; each device's series lives at `<base_url>/<resource>`.
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between cycle starts.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Max readings in a device's chart window.
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
        }
    }
}

fn default_window() -> usize {
    crate::history::DEFAULT_WINDOW
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
    #[serde(default = "default_center_lng")]
    pub center_lng: f64,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    #[serde(default = "default_marker_icon_url")]
    pub marker_icon_url: String,
    /// Icon width and height in pixels.
    #[serde(default = "default_marker_icon_size")]
    pub marker_icon_size: [u32; 2],
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lng: default_center_lng(),
            zoom: default_zoom(),
            marker_icon_url: default_marker_icon_url(),
            marker_icon_size: default_marker_icon_size(),
        }
    }
}

fn default_center_lat() -> f64 {
    46.0569
}

fn default_center_lng() -> f64 {
    14.5058
}

fn default_zoom() -> u8 {
    13
}

fn default_marker_icon_url() -> String {
    "/static/marker.png".into()
}

/// Largest accepted marker icon side, in pixels.
pub const MAX_ICON_SIDE: u32 = 4096;

fn default_marker_icon_size() -> [u32; 2] {
    [32, 32]
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: u32,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub resource: String,
}

impl From<&DeviceConfig> for Device {
    fn from(d: &DeviceConfig) -> Self {
        Device {
            id: d.id,
            name: d.name.clone(),
            position: LatLng {
                lat: d.lat,
                lng: d.lng,
            },
            resource: d.resource.clone(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Device catalog in configuration order.
    pub fn catalog(&self) -> DeviceCatalog {
        DeviceCatalog::new(self.devices.iter().map(Device::from).collect())
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        let base = self.source.base_url.trim();
        anyhow::ensure!(
            base.starts_with("http://") || base.starts_with("https://"),
            "source.base_url must be an http(s) URL, got {:?}",
            self.source.base_url
        );
        anyhow::ensure!(
            self.source.request_timeout_ms > 0,
            "source.request_timeout_ms must be > 0, got {}",
            self.source.request_timeout_ms
        );
        anyhow::ensure!(
            self.refresh.interval_secs > 0,
            "refresh.interval_secs must be > 0, got {}",
            self.refresh.interval_secs
        );
        anyhow::ensure!(
            self.history.window > 0,
            "history.window must be > 0, got {}",
            self.history.window
        );
        anyhow::ensure!(
            (-90.0..=90.0).contains(&self.map.center_lat)
                && (-180.0..=180.0).contains(&self.map.center_lng),
            "map center must be a valid lat/lng, got ({}, {})",
            self.map.center_lat,
            self.map.center_lng
        );
        anyhow::ensure!(
            self.map
                .marker_icon_size
                .iter()
                .all(|side| (1..=MAX_ICON_SIDE).contains(side)),
            "map.marker_icon_size must be within 1..={} px per side, got {:?}",
            MAX_ICON_SIDE,
            self.map.marker_icon_size
        );
        anyhow::ensure!(
            !self.devices.is_empty(),
            "devices must list at least one device"
        );

        let mut seen = HashSet::with_capacity(self.devices.len());
        for d in &self.devices {
            anyhow::ensure!(seen.insert(d.id), "devices: duplicate id {}", d.id);
            anyhow::ensure!(
                !d.name.trim().is_empty(),
                "devices[{}].name must be non-empty",
                d.id
            );
            anyhow::ensure!(
                !d.resource.trim().is_empty(),
                "devices[{}].resource must be non-empty",
                d.id
            );
            anyhow::ensure!(
                (-90.0..=90.0).contains(&d.lat),
                "devices[{}].lat must be within [-90, 90], got {}",
                d.id,
                d.lat
            );
            anyhow::ensure!(
                (-180.0..=180.0).contains(&d.lng),
                "devices[{}].lng must be within [-180, 180], got {}",
                d.id,
                d.lng
            );
        }
        Ok(())
    }
}
