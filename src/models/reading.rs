// One timestamped sample, plus the wire shape the remote store emits

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Decoded reading. Fields pass through as received; no range checks here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// °C
    pub temperature: f64,
    /// %
    pub humidity: f64,
    /// lux
    pub illuminance: i64,
    /// volts
    pub light: f64,
}

/// Reading as stored remotely: `{ts, temperature, humidity, illu, light}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireReading {
    pub ts: String,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(deserialize_with = "integral_lux")]
    pub illu: i64,
    pub light: f64,
}

impl WireReading {
    /// Parses `ts`; everything else is copied as-is.
    pub fn into_reading(self) -> Result<Reading, chrono::ParseError> {
        let timestamp = parse_timestamp(&self.ts)?;
        Ok(Reading {
            timestamp,
            temperature: self.temperature,
            humidity: self.humidity,
            illuminance: self.illu,
            light: self.light,
        })
    }
}

/// RFC 3339 instants, or a zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(t) => Ok(t.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

/// Some loggers write lux as `412.0`; accept that and round.
fn integral_lux<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lux {
        Int(i64),
        Float(f64),
    }

    match Lux::deserialize(deserializer)? {
        Lux::Int(v) => Ok(v),
        Lux::Float(v) if v.is_finite() => Ok(v.round() as i64),
        Lux::Float(v) => Err(serde::de::Error::custom(format!(
            "illu must be a finite number, got {}",
            v
        ))),
    }
}
