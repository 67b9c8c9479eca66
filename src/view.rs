// Snapshot -> render-ready marker records for the map surface

use std::sync::Arc;

use chrono::SecondsFormat;
use serde::Serialize;

use crate::config::MapConfig;
use crate::history::{self, Field, HistoryView, PlotPoint};
use crate::models::{Device, DeviceCatalog, DeviceId, LatLng, Snapshot, Status};

/// Shown in place of any value that cannot be formatted.
pub const NO_DATA: &str = "No data available";
pub const LOADING_TEXT: &str = "Loading sensor data…";

/// Marker icon settings, handed to the adapter instead of living in a global.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerStyle {
    pub icon_url: String,
    pub icon_size: [u32; 2],
    /// Pixel offset of the icon tip: bottom centre.
    pub icon_anchor: [u32; 2],
    /// Popup offset relative to the anchor: just above the icon.
    pub popup_anchor: [i32; 2],
}

impl MarkerStyle {
    pub fn new(icon_url: impl Into<String>, icon_size: [u32; 2]) -> Self {
        let [w, h] = icon_size;
        Self {
            icon_url: icon_url.into(),
            icon_size,
            icon_anchor: [w / 2, h],
            popup_anchor: [0, -i32::try_from(h).unwrap_or(i32::MAX)],
        }
    }
}

impl From<&MapConfig> for MarkerStyle {
    fn from(map: &MapConfig) -> Self {
        Self::new(map.marker_icon_url.clone(), map.marker_icon_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub field: Field,
    pub label: &'static str,
    pub unit: &'static str,
    /// Formatted latest value, or [`NO_DATA`].
    pub latest: String,
    pub min: Option<String>,
    pub max: Option<String>,
    pub points: Vec<PlotPoint>,
    /// Stable chart gradient id: `gradient-<device id>-<field>`.
    pub gradient_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupPayload {
    pub title: String,
    /// Latest reading's instant, RFC 3339 UTC.
    pub updated: Option<String>,
    pub no_data: bool,
    /// [`NO_DATA`] when the device has no readings.
    pub message: Option<String>,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerView {
    pub id: DeviceId,
    pub position: LatLng,
    pub label: String,
    pub popup: PopupPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Loading,
    Error,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBanner {
    pub kind: BannerKind,
    pub text: String,
}

impl StatusBanner {
    pub fn for_status(status: &Status) -> Option<Self> {
        match status {
            Status::Loading => Some(Self {
                kind: BannerKind::Loading,
                text: LOADING_TEXT.into(),
            }),
            Status::Error { message } => Some(Self {
                kind: BannerKind::Error,
                text: message.clone(),
            }),
            Status::Ready {
                notice: Some(notice),
            } => Some(Self {
                kind: BannerKind::Notice,
                text: notice.clone(),
            }),
            Status::Ready { notice: None } => None,
        }
    }
}

/// Everything the map surface needs for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub cycle: u64,
    pub banner: Option<StatusBanner>,
    pub style: MarkerStyle,
    pub markers: Vec<MarkerView>,
}

/// Value text with per-field precision: 1 decimal for temperature and humidity,
/// 2 for light, none for illuminance.
pub fn format_value(field: Field, value: f64) -> String {
    if !value.is_finite() {
        return NO_DATA.to_string();
    }
    match field {
        Field::Temperature | Field::Humidity => format!("{:.1}", value),
        Field::Light => format!("{:.2}", value),
        Field::Illuminance => format!("{:.0}", value),
    }
}

pub fn gradient_id(device: DeviceId, field: Field) -> String {
    format!("gradient-{}-{}", device, field.key())
}

pub struct ViewAdapter {
    style: MarkerStyle,
    window: usize,
}

impl ViewAdapter {
    pub fn new(style: MarkerStyle, window: usize) -> Self {
        Self { style, window }
    }

    pub fn marker(&self, device: &Device, view: &HistoryView) -> MarkerView {
        let fields = Field::ALL
            .iter()
            .map(|&field| {
                let range = view.per_field.get(&field);
                FieldView {
                    field,
                    label: field.label(),
                    unit: field.unit(),
                    latest: view
                        .latest
                        .as_ref()
                        .map(|r| format_value(field, field.value(r)))
                        .unwrap_or_else(|| NO_DATA.to_string()),
                    min: range.map(|r| format_value(field, r.min)),
                    max: range.map(|r| format_value(field, r.max)),
                    points: view.points(field),
                    gradient_id: gradient_id(device.id, field),
                }
            })
            .collect();

        let no_data = view.latest.is_none();
        MarkerView {
            id: device.id,
            position: device.position,
            label: device.name.clone(),
            popup: PopupPayload {
                title: device.name.clone(),
                updated: view
                    .latest
                    .as_ref()
                    .map(|r| r.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
                no_data,
                message: no_data.then(|| NO_DATA.to_string()),
                fields,
            },
        }
    }

    /// Markers in catalog order; devices missing from the snapshot render as empty.
    pub fn map_view(&self, catalog: &DeviceCatalog, snapshot: &Snapshot) -> MapView {
        let markers = catalog
            .iter()
            .map(|device| {
                let view = history::project(snapshot.readings(device.id), self.window);
                self.marker(device, &view)
            })
            .collect();
        MapView {
            cycle: snapshot.cycle,
            banner: StatusBanner::for_status(&snapshot.status),
            style: self.style.clone(),
            markers,
        }
    }
}

/// Hands out the same `Arc<MapView>` until the snapshot cycle changes.
pub struct ViewCache {
    adapter: ViewAdapter,
    last: Option<Arc<MapView>>,
}

impl ViewCache {
    pub fn new(adapter: ViewAdapter) -> Self {
        Self {
            adapter,
            last: None,
        }
    }

    pub fn view(&mut self, catalog: &DeviceCatalog, snapshot: &Snapshot) -> Arc<MapView> {
        match &self.last {
            Some(v) if v.cycle == snapshot.cycle => v.clone(),
            _ => {
                let v = Arc::new(self.adapter.map_view(catalog, snapshot));
                self.last = Some(v.clone());
                v
            }
        }
    }
}
