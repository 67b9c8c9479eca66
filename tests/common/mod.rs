// Shared test helpers
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sensorboard::fetcher::{FetchError, FetchErrorKind, ReadingFetcher};
use sensorboard::models::*;

pub fn reading(minute: u32, temperature: f64) -> Reading {
    Reading {
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
        temperature,
        humidity: 45.0,
        illuminance: 250,
        light: 1.5,
    }
}

pub fn device(id: DeviceId) -> Device {
    Device {
        id,
        name: format!("sensor-{}", id),
        position: LatLng {
            lat: 46.0 + id as f64 / 100.0,
            lng: 14.5,
        },
        resource: format!("sensor{}.json", id),
    }
}

pub fn catalog(n: u32) -> DeviceCatalog {
    DeviceCatalog::new((1..=n).map(device).collect())
}

/// Fetcher whose per-device results are set by the test. Unset devices return an empty series.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<DeviceId, Result<Vec<Reading>, String>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn succeed(&self, id: DeviceId, readings: Vec<Reading>) {
        self.responses.lock().unwrap().insert(id, Ok(readings));
    }

    pub fn fail(&self, id: DeviceId, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(id, Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ReadingFetcher for ScriptedFetcher {
    async fn fetch(&self, device: &Device) -> Result<Vec<Reading>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.responses.lock().unwrap().get(&device.id).cloned();
        match scripted {
            Some(Ok(readings)) => Ok(readings),
            Some(Err(message)) => Err(FetchError::new(device, FetchErrorKind::Transport, message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Serves `router` on an ephemeral local port; returns its base URL.
pub async fn spawn_store(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
