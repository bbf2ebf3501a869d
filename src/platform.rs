//! # Sensor Platform
//!
//! Owns the entities built from configuration and drives them:
//!
//! 1. **Setup**: fetch every configured station once, register its device, create
//!    the datum entity and (when the station publishes a datum) the sea-level entity
//! 2. **Poll**: every scan interval, update each entity in turn with one HTTP round trip
//! 3. **Publish**: write each entity's snapshot as a JSON line
//!
//! Updates never overlap. A tick that comes due while a cycle is still running is
//! delayed rather than bursted, and a failed update only affects its own entity for
//! that cycle.

use crate::config::Config;
use crate::flood_api::FloodClient;
use crate::sensor::{DeviceInfo, FloodSensor, SensorKind, SensorSnapshot};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("no station could be set up ({failed} failed)")]
    NoStations { failed: usize },

    #[error("cannot publish state: {0}")]
    Publish(#[from] io::Error),
}

/// Devices known to the platform, keyed by device name.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceInfo>,
}

impl DeviceRegistry {
    /// Register a device unless one with the same name already exists.
    pub fn get_or_create(&mut self, info: DeviceInfo) -> &DeviceInfo {
        self.devices.entry(info.name.clone()).or_insert(info)
    }

    pub fn get(&self, name: &str) -> Option<&DeviceInfo> {
        self.devices.get(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.values()
    }
}

/// Outcome of one update cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub updated: usize,
    pub failed: usize,
}

/// Writes entity snapshots as JSON lines.
pub struct StatePublisher<W: Write> {
    out: W,
}

impl<W: Write> StatePublisher<W> {
    pub fn new(out: W) -> Self {
        StatePublisher { out }
    }

    pub fn publish(&mut self, snapshots: &[SensorSnapshot]) -> io::Result<()> {
        for snapshot in snapshots {
            serde_json::to_writer(&mut self.out, snapshot)?;
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Running set of flood sensors.
#[derive(Debug)]
pub struct Platform {
    client: FloodClient,
    sensors: Vec<FloodSensor>,
    devices: DeviceRegistry,
    scan_interval: Duration,
}

/// Build the platform: one metadata fetch per configured station.
///
/// Stations whose metadata cannot be fetched are logged and skipped. Setup only
/// fails when no station at all could be set up.
pub async fn setup_platform(config: &Config, client: FloodClient) -> Result<Platform, PlatformError> {
    info!(stations = config.sensors.len(), "setting up Environment UK flood sensors");

    let mut sensors = Vec::new();
    let mut devices = DeviceRegistry::default();
    let mut seen = HashSet::new();
    let mut failed = 0;

    for sensor_config in &config.sensors {
        let id = sensor_config.id.trim();
        if !seen.insert(id.to_string()) {
            warn!(station = id, "station configured twice, ignoring duplicate");
            continue;
        }

        info!(station = id, "fetching station information");
        let station = match client.fetch_station(id, sensor_config.name.as_deref()).await {
            Ok(station) => Arc::new(station),
            Err(e) => {
                error!(station = id, error = %e, "station setup failed");
                failed += 1;
                continue;
            }
        };

        devices.get_or_create(DeviceInfo::for_station(&station.id));
        sensors.push(FloodSensor::new(SensorKind::Datum, Arc::clone(&station)));
        match station.datum_offset {
            Some(datum) => {
                info!(station = id, datum, "station datum known, adding sea-level sensor");
                sensors.push(FloodSensor::new(SensorKind::SeaLevel, Arc::clone(&station)));
            }
            None => warn!(station = id, "station publishes no datum, sea-level sensor skipped"),
        }
    }

    if sensors.is_empty() {
        return Err(PlatformError::NoStations { failed });
    }

    Ok(Platform {
        client,
        sensors,
        devices,
        scan_interval: config.api.scan_interval(),
    })
}

impl Platform {
    pub fn sensors(&self) -> &[FloodSensor] {
        &self.sensors
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn snapshots(&self) -> Vec<SensorSnapshot> {
        self.sensors.iter().map(FloodSensor::snapshot).collect()
    }

    /// Update every entity once, sequentially. Failures are logged and counted.
    pub async fn update_all(&mut self) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        for sensor in &mut self.sensors {
            match sensor.update(&self.client).await {
                Ok(()) => summary.updated += 1,
                Err(e) => {
                    warn!(entity = %sensor.unique_id(), error = %e, "update failed");
                    summary.failed += 1;
                }
            }
        }
        info!(
            updated = summary.updated,
            failed = summary.failed,
            "update cycle complete"
        );
        summary
    }

    /// Poll on the scan interval until `shutdown` resolves, publishing after
    /// every cycle. The first cycle runs immediately.
    ///
    /// Shutdown also interrupts a cycle in progress; its in-flight request is
    /// dropped and nothing is published for that cycle.
    pub async fn run<W, F>(
        &mut self,
        publisher: &mut StatePublisher<W>,
        shutdown: F,
    ) -> Result<(), PlatformError>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping poll loop");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut shutdown => {
                            info!("shutdown requested during update cycle, abandoning it");
                            return Ok(());
                        }
                        _ = self.update_all() => {}
                    }
                    publisher.publish(&self.snapshots())?;
                }
            }
        }
    }
}
