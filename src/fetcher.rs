// Per-device retrieval of a reading series from the remote store

use std::future::Future;
use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use tracing::instrument;

use crate::models::{Device, Reading, WireReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Connect failure, timeout, non-2xx status.
    Transport,
    /// Body is not a JSON array of readings, or a reading lacks a field.
    Shape,
    /// A reading's `ts` is not a valid instant.
    Parse,
}

/// A failed fetch for one device. Never aborts a cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{device}: {message}")]
pub struct FetchError {
    pub device: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(device: &Device, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            device: device.name.clone(),
            kind,
            message: message.into(),
        }
    }
}

/// Retrieves a device's full series. Implementations must not serve cached responses.
pub trait ReadingFetcher: Send + Sync + 'static {
    fn fetch(&self, device: &Device)
    -> impl Future<Output = Result<Vec<Reading>, FetchError>> + Send;
}

/// Fetches `<base_url>/<resource>` over HTTP with caching disabled.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, device: &Device) -> String {
        format!(
            "{}/{}",
            self.base_url,
            device.resource.trim_start_matches('/')
        )
    }
}

impl ReadingFetcher for HttpFetcher {
    #[instrument(skip(self, device), fields(device = %device.name, operation = "fetch"))]
    async fn fetch(&self, device: &Device) -> Result<Vec<Reading>, FetchError> {
        let url = self.url_for(device);
        let transport = |e: reqwest::Error| {
            let message = if e.is_timeout() {
                format!("request to {} timed out", url)
            } else {
                format!("request to {} failed: {}", url, e)
            };
            FetchError::new(device, FetchErrorKind::Transport, message)
        };

        let resp = self.client.get(&url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::new(
                device,
                FetchErrorKind::Transport,
                format!("{} returned HTTP {}", url, status),
            ));
        }
        let body = resp.bytes().await.map_err(transport)?;
        let readings = decode_readings(device, &body)?;
        tracing::debug!(readings = readings.len(), "series fetched");
        Ok(readings)
    }
}

/// Decodes a store body (JSON array of wire readings) in order.
pub fn decode_readings(device: &Device, body: &[u8]) -> Result<Vec<Reading>, FetchError> {
    let wire: Vec<WireReading> = serde_json::from_slice(body).map_err(|e| {
        FetchError::new(
            device,
            FetchErrorKind::Shape,
            format!("malformed reading data: {}", e),
        )
    })?;
    wire.into_iter()
        .enumerate()
        .map(|(i, w)| {
            let ts = w.ts.clone();
            w.into_reading().map_err(|e| {
                FetchError::new(
                    device,
                    FetchErrorKind::Parse,
                    format!("reading {} has invalid timestamp {:?}: {}", i, ts, e),
                )
            })
        })
        .collect()
}
