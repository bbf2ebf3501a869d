//! # Flood Sensor Core Library
//!
//! This library turns stations of the Environment Agency real-time flood-monitoring
//! API into polled water-level sensors. Each configured station becomes a device with
//! one or two numeric entities:
//!
//! - **Datum level**: the latest reading, in meters above the station's local datum
//! - **Sea level**: the latest reading plus the station's datum offset (meters above
//!   ordnance datum), only when the station publishes a datum
//!
//! ## Data Flow
//! 1. **Configure**: load station identifiers from `flood-config.toml`
//! 2. **Describe**: fetch each station's metadata once (`/id/stations/{id}.json`)
//! 3. **Poll**: on every scan interval fetch `/id/stations/{id}/readings?latest`
//!    and update each entity's state
//! 4. **Publish**: write one JSON line per entity to stdout
//!
//! Nothing is persisted. All state is rebuilt from the API on restart.
//!
//! ## Core Types
//! - [`Station`]: immutable station metadata shared by a station's entities
//! - [`Reading`]: the latest value reported by a station

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod flood_api;
pub mod platform;
pub mod renderer;
pub mod sensor;

/// Default display name when neither the configuration nor the API provides one.
pub const DEFAULT_NAME: &str = "Environment UK Flood Sensor";

/// Station metadata, fetched once at startup.
///
/// # Example
/// ```
/// use flood_sensor_lib::Station;
///
/// let station = Station {
///     id: "E70024".to_string(),
///     name: "Romsey".to_string(),
///     latitude: 50.98,
///     longitude: -1.50,
///     datum_offset: Some(13.25),
/// };
///
/// assert_eq!(station.sea_level(1.5), Some(14.75));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Station code, e.g. `E70024`
    pub id: String,
    /// Display name for the station's entities
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Height of the station datum above ordnance datum, in meters
    pub datum_offset: Option<f64>,
}

impl Station {
    /// Convert a reading above the station datum to meters above sea level.
    pub fn sea_level(&self, value_m: f64) -> Option<f64> {
        self.datum_offset.map(|datum| value_m + datum)
    }
}

/// Latest reading reported by a station.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Water level in meters above the station datum
    pub value: f64,
    /// Upstream `dateTime`, when it parsed
    pub timestamp: Option<DateTime<Utc>>,
    /// Measure URI the reading belongs to
    pub measure: Option<String>,
}
