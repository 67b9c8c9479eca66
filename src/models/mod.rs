// Domain models: devices, readings, snapshots

mod device;
mod reading;
mod snapshot;

pub use device::{Device, DeviceCatalog, DeviceId, LatLng};
pub use reading::{Reading, WireReading, parse_timestamp};
pub use snapshot::{DeviceSeries, Snapshot, Status};
