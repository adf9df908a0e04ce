//! In-memory inventory levels and change detection
//!
//! The controller repeats readings constantly; only a change of the rounded
//! level produces a snapshot, so store writes follow real stock movement.

use crate::parser::Reading;
use chrono::NaiveDateTime;
use station_common::{SensorId, SensorTable};
use std::collections::BTreeMap;

/// Full copy of all levels at the moment one of them changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEvent {
    pub taken_at: NaiveDateTime,
    pub levels: BTreeMap<SensorId, i64>,
}

/// Current level (whole grams) of every installed sensor, zero at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryState {
    levels: BTreeMap<SensorId, i64>,
}

impl InventoryState {
    pub fn new(sensors: &SensorTable) -> Self {
        Self {
            levels: sensors.ids().map(|id| (id, 0)).collect(),
        }
    }

    pub fn level(&self, sensor: SensorId) -> Option<i64> {
        self.levels.get(&sensor).copied()
    }

    pub fn levels(&self) -> &BTreeMap<SensorId, i64> {
        &self.levels
    }

    /// Apply a reading; returns a snapshot if the sensor's level changed
    pub fn apply(&mut self, reading: Reading, taken_at: NaiveDateTime) -> Option<SnapshotEvent> {
        let grams = round_grams(reading.grams)?;
        let level = self.levels.get_mut(&reading.sensor)?;
        if *level == grams {
            return None;
        }

        log::debug!("{}: {} g -> {} g", reading.sensor, level, grams);
        *level = grams;

        Some(SnapshotEvent {
            taken_at,
            levels: self.levels.clone(),
        })
    }
}

/// Heaviest level a loadcell can report (1000 t); anything above is line noise
pub const MAX_GRAMS: i64 = 1_000_000_000;

/// Round half away from zero to whole grams; negative drift reads as empty
pub fn round_grams(grams: f64) -> Option<i64> {
    if !grams.is_finite() {
        return None;
    }
    let rounded = grams.round();
    if rounded > MAX_GRAMS as f64 {
        log::warn!("Discarding implausible weight: {} g", grams);
        return None;
    }
    Some((rounded as i64).max(0))
}
