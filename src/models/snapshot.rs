// Per-device series and the published cross-device snapshot

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Device, DeviceCatalog, DeviceId, Reading};

/// A device and its most recently fetched series (oldest first, possibly empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSeries {
    pub device: Device,
    pub readings: Vec<Reading>,
}

impl DeviceSeries {
    pub fn empty(device: Device) -> Self {
        Self {
            device,
            readings: Vec::new(),
        }
    }

    /// Last element of the series as returned by the store.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }
}

/// Global status; serializes as `{"state": "loading" | "ready" | "error", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Status {
    /// No cycle has completed yet.
    Loading,
    /// Data is available. `notice` carries the last failure of a partially failed cycle.
    Ready { notice: Option<String> },
    /// No device has ever produced data; `message` is the last failure seen.
    Error { message: String },
}

impl Status {
    pub fn message(&self) -> Option<&str> {
        match self {
            Status::Loading => None,
            Status::Ready { notice } => notice.as_deref(),
            Status::Error { message } => Some(message),
        }
    }
}

/// Immutable view across all devices, published once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// 0 before the first cycle completes, then +1 per published cycle.
    pub cycle: u64,
    pub status: Status,
    /// Set once any device fetch has succeeded; never cleared.
    pub has_data: bool,
    pub series: BTreeMap<DeviceId, DeviceSeries>,
}

impl Snapshot {
    /// Pre-first-cycle state: `Loading`, one empty series per catalog device.
    pub fn initial(catalog: &DeviceCatalog) -> Self {
        let series = catalog
            .iter()
            .map(|d| (d.id, DeviceSeries::empty(d.clone())))
            .collect();
        Self {
            cycle: 0,
            status: Status::Loading,
            has_data: false,
            series,
        }
    }

    pub fn series(&self, id: DeviceId) -> Option<&DeviceSeries> {
        self.series.get(&id)
    }

    /// Readings for `id`; empty for devices the snapshot does not know.
    pub fn readings(&self, id: DeviceId) -> &[Reading] {
        self.series
            .get(&id)
            .map(|s| s.readings.as_slice())
            .unwrap_or(&[])
    }
}
