//! Loadcell sensors and their mapping to store columns

use crate::error::SensorError;
use crate::rows::DATE_COLUMN;
use std::fmt;
use std::str::FromStr;

/// Index of a loadcell as printed by the station firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorId(u8);

impl SensorId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loadcell_{}", self.0)
    }
}

/// A loadcell and the store column holding its level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub id: SensorId,
    pub column: String,
}

impl Sensor {
    pub fn new(index: u8, column: &str) -> Self {
        Self {
            id: SensorId::new(index),
            column: column.to_string(),
        }
    }
}

/// Parses `<index>=<column>`, e.g. `1=caramel_syrup`
impl FromStr for Sensor {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, column) = s
            .split_once('=')
            .ok_or_else(|| SensorError::InvalidMapping(s.to_string()))?;
        let index: u8 = index
            .trim()
            .parse()
            .map_err(|_| SensorError::InvalidMapping(s.to_string()))?;
        let column = column.trim();
        if !is_valid_column(column) {
            return Err(SensorError::InvalidColumn(column.to_string()));
        }
        Ok(Sensor::new(index, column))
    }
}

/// Column names end up in SQL statements and REST query strings,
/// so only plain identifiers are accepted.
pub fn is_valid_column(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The fixed set of loadcells installed in the station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorTable {
    sensors: Vec<Sensor>,
}

impl SensorTable {
    /// Build a table, rejecting duplicates and unusable column names
    pub fn new(sensors: Vec<Sensor>) -> Result<Self, SensorError> {
        if sensors.is_empty() {
            return Err(SensorError::Empty);
        }

        for (i, sensor) in sensors.iter().enumerate() {
            if !is_valid_column(&sensor.column) {
                return Err(SensorError::InvalidColumn(sensor.column.clone()));
            }
            if sensor.column == DATE_COLUMN {
                return Err(SensorError::ReservedColumn(sensor.column.clone()));
            }
            let earlier = &sensors[..i];
            if earlier.iter().any(|s| s.id == sensor.id) {
                return Err(SensorError::DuplicateSensor(sensor.id.index()));
            }
            if earlier.iter().any(|s| s.column == sensor.column) {
                return Err(SensorError::DuplicateColumn(sensor.column.clone()));
            }
        }

        log::debug!(
            "Sensor table: {}",
            sensors
                .iter()
                .map(|s| format!("{} -> {}", s.id, s.column))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { sensors })
    }

    /// Store column for a sensor, if it is installed
    pub fn column(&self, id: SensorId) -> Option<&str> {
        self.sensors
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.column.as_str())
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.sensors.iter().any(|s| s.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.sensors.iter().map(|s| s.id)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(|s| s.column.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// Three loadcells: caramel syrup, coffee beans, chocolate powder
impl Default for SensorTable {
    fn default() -> Self {
        Self {
            sensors: vec![
                Sensor::new(1, "caramel_syrup"),
                Sensor::new(2, "coffee_beans"),
                Sensor::new(3, "chocolate_powder"),
            ],
        }
    }
}
