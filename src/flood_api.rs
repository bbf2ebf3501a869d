//! # Environment Agency Flood-Monitoring API Client
//!
//! This module handles all network operations against the Environment Agency
//! real-time flood-monitoring API. It is deliberately thin: one GET per call, a fixed
//! timeout, no caching and no retries.
//!
//! ## Endpoints
//!
//! ### Station metadata
//! - **URL**: `{base}/id/stations/{id}.json`
//! - **Used fields**: `items.label`, `items.lat`, `items.long`, `items.stageScale.datum`
//!   (or `items.datumOffset`)
//! - **Fetched**: once per station at startup
//!
//! ### Latest readings
//! - **URL**: `{base}/id/stations/{id}/readings?latest`
//! - **Used fields**: `items[0].value`, `items[0].dateTime`, `items[0].measure`
//! - **Fetched**: once per entity per scan interval
//!
//! ## Response Shape Quirks
//!
//! The API is not strict about cardinality. Stations registered twice come back with
//! `lat`, `long` and `label` as arrays, `items` is occasionally an array for a single
//! station, and a reading's `value` can be an array. Every such field accepts either
//! form and the first element wins. Only the first reading item is decoded, so a
//! malformed later item does not spoil an otherwise usable response.
//!
//! ## Error Handling
//!
//! All failures propagate through [`FloodError`]. The caller decides what a failure
//! means; for entities it means "keep the previous value, mark unavailable".

use crate::config::ApiConfig;
use crate::{Reading, Station, DEFAULT_NAME};
use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("flood-sensor/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching or decoding API responses.
#[derive(Error, Debug)]
pub enum FloodError {
    /// Request failed (connect, timeout, TLS or body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Body was not JSON or lacked a required field
    #[error("unexpected response: {0}")]
    Parse(String),

    /// Readings response held an empty `items` array
    #[error("no readings in response")]
    NoReadings,
}

// ---------------------------------------------------------------------------
// Wire structures
// ---------------------------------------------------------------------------

/// A field the API sends either as a scalar or as an array.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.into_iter().next(),
        }
    }
}

#[derive(Deserialize)]
struct StationEnvelope {
    items: OneOrMany<StationItem>,
}

#[derive(Deserialize, Debug)]
struct StationItem {
    label: Option<OneOrMany<String>>,
    lat: Option<OneOrMany<f64>>,
    long: Option<OneOrMany<f64>>,
    #[serde(rename = "stageScale")]
    stage_scale: Option<StageScaleRef>,
    #[serde(rename = "datumOffset")]
    datum_offset: Option<f64>,
}

/// `stageScale` is embedded for most stations and a bare link for the rest.
/// Links are not followed.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum StageScaleRef {
    Embedded(StageScale),
    Other(IgnoredAny),
}

#[derive(Deserialize, Debug)]
struct StageScale {
    datum: Option<f64>,
}

#[derive(Deserialize)]
struct ReadingsEnvelope {
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ReadingItem {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    measure: Option<serde_json::Value>,
    value: Option<OneOrMany<f64>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client bound to one API root.
#[derive(Debug, Clone)]
pub struct FloodClient {
    client: reqwest::Client,
    base_url: String,
}

impl FloodClient {
    /// Build a client with the configured timeout applied to every request.
    pub fn new(api: &ApiConfig) -> Result<Self, FloodError> {
        let client = reqwest::Client::builder()
            .timeout(api.timeout())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(FloodClient {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn station_url(&self, id: &str) -> String {
        format!("{}/id/stations/{}.json", self.base_url, id)
    }

    pub fn readings_url(&self, id: &str) -> String {
        format!("{}/id/stations/{}/readings?latest", self.base_url, id)
    }

    /// Fetch station metadata. `name` overrides the station label when given.
    pub async fn fetch_station(&self, id: &str, name: Option<&str>) -> Result<Station, FloodError> {
        let body = self.get_text(&self.station_url(id)).await?;
        parse_station(id, name, &body)
    }

    /// Fetch the most recent reading of a station.
    pub async fn fetch_latest_reading(&self, id: &str) -> Result<Reading, FloodError> {
        let body = self.get_text(&self.readings_url(id)).await?;
        parse_latest_reading(&body)
    }

    async fn get_text(&self, url: &str) -> Result<String, FloodError> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FloodError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Decode a station metadata response.
///
/// # Errors
/// - `FloodError::Parse` when the body is not JSON, has no station item, or
///   lacks a latitude or longitude.
///
/// A missing datum is not an error; the station simply has no sea-level conversion.
pub fn parse_station(id: &str, name: Option<&str>, body: &str) -> Result<Station, FloodError> {
    let envelope: StationEnvelope = serde_json::from_str(body)
        .map_err(|e| FloodError::Parse(format!("station {}: {}", id, e)))?;
    let item = envelope
        .items
        .into_first()
        .ok_or_else(|| FloodError::Parse(format!("station {}: no items", id)))?;

    let latitude = item
        .lat
        .and_then(OneOrMany::into_first)
        .ok_or_else(|| FloodError::Parse(format!("station {}: missing lat", id)))?;
    let longitude = item
        .long
        .and_then(OneOrMany::into_first)
        .ok_or_else(|| FloodError::Parse(format!("station {}: missing long", id)))?;

    let datum_offset = match item.stage_scale {
        Some(StageScaleRef::Embedded(StageScale { datum: Some(datum) })) => Some(datum),
        _ => item.datum_offset,
    };

    let name = name
        .map(str::to_string)
        .or_else(|| item.label.and_then(OneOrMany::into_first))
        .unwrap_or_else(|| DEFAULT_NAME.to_string());

    Ok(Station {
        id: id.to_string(),
        name,
        latitude,
        longitude,
        datum_offset,
    })
}

/// Decode a `readings?latest` response, keeping only the first item.
///
/// # Errors
/// - `FloodError::NoReadings` — `items` is empty.
/// - `FloodError::Parse` — malformed JSON, `items` missing, or the first item has
///   no numeric `value`.
pub fn parse_latest_reading(body: &str) -> Result<Reading, FloodError> {
    let envelope: ReadingsEnvelope = serde_json::from_str(body)
        .map_err(|e| FloodError::Parse(format!("readings: {}", e)))?;
    let first = envelope
        .items
        .into_iter()
        .next()
        .ok_or(FloodError::NoReadings)?;

    let item: ReadingItem = serde_json::from_value(first)
        .map_err(|e| FloodError::Parse(format!("first reading: {}", e)))?;

    let value = item
        .value
        .and_then(OneOrMany::into_first)
        .ok_or_else(|| FloodError::Parse("first reading has no value".to_string()))?;

    let timestamp = item
        .date_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let measure = item.measure.and_then(|measure| match measure {
        serde_json::Value::String(uri) => Some(uri),
        serde_json::Value::Object(map) => map.get("@id").and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    });

    Ok(Reading {
        value,
        timestamp,
        measure,
    })
}
