// Bounded recent-window projection of a device series, for inline charts.
// Pure functions only: a view is recomputed per render and never cached.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Reading;

/// Default number of readings in a chart window.
pub const DEFAULT_WINDOW: usize = 20;

/// Vertical position used when a field has no spread (single point, flat line).
pub const FLAT_Y: f64 = 0.5;

/// Plottable reading fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Temperature,
    Humidity,
    Illuminance,
    Light,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Temperature,
        Field::Humidity,
        Field::Illuminance,
        Field::Light,
    ];

    pub fn value(self, r: &Reading) -> f64 {
        match self {
            Field::Temperature => r.temperature,
            Field::Humidity => r.humidity,
            Field::Illuminance => r.illuminance as f64,
            Field::Light => r.light,
        }
    }

    /// Stable lowercase key, used in identifiers and JSON.
    pub fn key(self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Illuminance => "illuminance",
            Field::Light => "light",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Temperature => "Temperature",
            Field::Humidity => "Humidity",
            Field::Illuminance => "Illuminance",
            Field::Light => "Light",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Field::Temperature => "°C",
            Field::Humidity => "%",
            Field::Illuminance => "lx",
            Field::Light => "V",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

/// Chart coordinates, both in [0, 1]. `x` runs oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub latest: Option<Reading>,
    /// Last `window` readings, oldest first.
    pub window: Vec<Reading>,
    /// Min/max over `window` only. A field is absent when it has no finite value in the window.
    pub per_field: BTreeMap<Field, FieldRange>,
}

impl HistoryView {
    pub fn values(&self, field: Field) -> Vec<f64> {
        self.window.iter().map(|r| field.value(r)).collect()
    }

    /// Normalized plot points for `field` over the window.
    pub fn points(&self, field: Field) -> Vec<PlotPoint> {
        normalize(&self.values(field))
    }
}

/// Derives the windowed view of `series`. `latest` is the series' last element.
pub fn project(series: &[Reading], window: usize) -> HistoryView {
    let start = series.len().saturating_sub(window);
    let window = series[start..].to_vec();

    let per_field = Field::ALL
        .iter()
        .filter_map(|&field| {
            let range = value_range(window.iter().map(|r| field.value(r)))?;
            Some((field, range))
        })
        .collect();

    HistoryView {
        latest: series.last().cloned(),
        window,
        per_field,
    }
}

/// Min/max over the finite values; `None` when there are none.
pub fn value_range(values: impl IntoIterator<Item = f64>) -> Option<FieldRange> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some(FieldRange { min: v, max: v }),
            Some(r) => Some(FieldRange {
                min: r.min.min(v),
                max: r.max.max(v),
            }),
        })
}

/// Maps N values to plot coordinates: `x = i / max(N - 1, 1)`,
/// `y = (v - min) / (max - min)` when `max > min`, else [`FLAT_Y`].
/// Non-finite values are left out; the remaining points keep their `x`.
pub fn normalize(values: &[f64]) -> Vec<PlotPoint> {
    let Some(range) = value_range(values.iter().copied()) else {
        return Vec::new();
    };
    let denom_x = values.len().saturating_sub(1).max(1) as f64;
    let spread = range.max - range.min;

    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| PlotPoint {
            x: i as f64 / denom_x,
            y: if spread > 0.0 {
                (v - range.min) / spread
            } else {
                FLAT_Y
            },
        })
        .collect()
}
