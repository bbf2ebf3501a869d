//! # Flood Sensor Entities
//!
//! A station exposes up to two numeric entities sharing one device:
//!
//! | Kind       | Value                        | Unique id suffix |
//! |------------|------------------------------|------------------|
//! | `Datum`    | reading `V`                  | `_mASD`          |
//! | `SeaLevel` | `V + datum_offset`           | `_mAOD`          |
//!
//! Entities hold only the latest value. A failed update never clears it; the entity
//! is marked unavailable until the next successful poll.

use crate::flood_api::{FloodClient, FloodError};
use crate::{Reading, Station};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

pub const MANUFACTURER: &str = "UK Environmental Agency";
pub const MODEL: &str = "Environment Agency Real Time flood-monitoring API";
pub const SW_VERSION: &str = "0.9";
/// Identifier domain used to group a station's entities under one device.
pub const DEVICE_DOMAIN: &str = "envuk_flood_api";

pub const UNIT_METERS: &str = "m";
pub const DEVICE_CLASS_DISTANCE: &str = "distance";
pub const STATE_CLASS_MEASUREMENT: &str = "measurement";

/// Which height an entity reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Meters above the station datum
    Datum,
    /// Meters above ordnance datum
    SeaLevel,
}

impl SensorKind {
    fn unique_id_suffix(self) -> &'static str {
        match self {
            SensorKind::Datum => "mASD",
            SensorKind::SeaLevel => "mAOD",
        }
    }

    /// Entity value for a reading, or `None` when it cannot be derived.
    pub fn value_for(self, reading: &Reading, station: &Station) -> Option<f64> {
        match self {
            SensorKind::Datum => Some(reading.value),
            SensorKind::SeaLevel => station.sea_level(reading.value),
        }
    }
}

/// Device grouping for a station's entities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
    pub identifiers: BTreeSet<(String, String)>,
}

impl DeviceInfo {
    pub fn for_station(station_id: &str) -> Self {
        let name = device_name(station_id);
        DeviceInfo {
            identifiers: BTreeSet::from([(DEVICE_DOMAIN.to_string(), name.clone())]),
            name,
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
            sw_version: SW_VERSION.to_string(),
        }
    }
}

fn device_name(station_id: &str) -> String {
    format!("ukenv_fs_{}", station_id)
}

/// Serializable view of an entity, published after every update cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub unique_id: String,
    pub name: String,
    pub kind: SensorKind,
    pub state: Option<f64>,
    pub available: bool,
    pub unit_of_measurement: &'static str,
    pub device_class: &'static str,
    pub state_class: &'static str,
    pub last_reading: Option<DateTime<Utc>>,
    /// Measure URI of the reading behind `state`
    pub measure: Option<String>,
    pub attributes: BTreeMap<&'static str, f64>,
    pub device: DeviceInfo,
}

/// One polled water-level entity.
#[derive(Debug)]
pub struct FloodSensor {
    kind: SensorKind,
    station: Arc<Station>,
    state: Option<f64>,
    last_reading: Option<DateTime<Utc>>,
    measure: Option<String>,
    available: bool,
}

impl FloodSensor {
    pub fn new(kind: SensorKind, station: Arc<Station>) -> Self {
        FloodSensor {
            kind,
            station,
            state: None,
            last_reading: None,
            measure: None,
            available: false,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn name(&self) -> String {
        match self.kind {
            SensorKind::Datum => self.station.name.clone(),
            SensorKind::SeaLevel => format!("{} Sea Level", self.station.name),
        }
    }

    pub fn unique_id(&self) -> String {
        format!(
            "{}_{}",
            device_name(&self.station.id),
            self.kind.unique_id_suffix()
        )
    }

    /// Latest value in meters; kept across failed updates.
    pub fn native_value(&self) -> Option<f64> {
        self.state
    }

    pub fn native_unit_of_measurement(&self) -> &'static str {
        UNIT_METERS
    }

    pub fn device_class(&self) -> &'static str {
        DEVICE_CLASS_DISTANCE
    }

    pub fn state_class(&self) -> &'static str {
        STATE_CLASS_MEASUREMENT
    }

    /// Whether the last update succeeded.
    pub fn available(&self) -> bool {
        self.available
    }

    pub fn last_reading(&self) -> Option<DateTime<Utc>> {
        self.last_reading
    }

    pub fn measure(&self) -> Option<&str> {
        self.measure.as_deref()
    }

    pub fn extra_state_attributes(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("latitude", self.station.latitude),
            ("longitude", self.station.longitude),
        ])
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::for_station(&self.station.id)
    }

    /// Store a fresh reading. Returns the new value, or `None` (state untouched)
    /// when this entity cannot derive one.
    pub fn apply_reading(&mut self, reading: &Reading) -> Option<f64> {
        let value = self.kind.value_for(reading, &self.station)?;
        self.state = Some(value);
        self.last_reading = reading.timestamp;
        self.measure = reading.measure.clone();
        self.available = true;
        Some(value)
    }

    /// Fetch the latest reading and update the state.
    ///
    /// On failure the previous value is kept, the entity is marked unavailable and
    /// the error is returned for the caller to log. There is no retry.
    pub async fn update(&mut self, client: &FloodClient) -> Result<(), FloodError> {
        info!(entity = %self.unique_id(), "updating flood sensor");
        let reading = match client.fetch_latest_reading(&self.station.id).await {
            Ok(reading) => reading,
            Err(e) => {
                self.available = false;
                return Err(e);
            }
        };
        if self.apply_reading(&reading).is_none() {
            self.available = false;
            return Err(FloodError::Parse(format!(
                "station {} has no datum offset",
                self.station.id
            )));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            unique_id: self.unique_id(),
            name: self.name(),
            kind: self.kind,
            state: self.state,
            available: self.available,
            unit_of_measurement: self.native_unit_of_measurement(),
            device_class: self.device_class(),
            state_class: self.state_class(),
            last_reading: self.last_reading,
            measure: self.measure.clone(),
            attributes: self.extra_state_attributes(),
            device: self.device_info(),
        }
    }
}
