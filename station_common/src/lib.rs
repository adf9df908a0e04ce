//! Station Common - shared types for the dispensing station
//!
//! Sensor configuration, table row layouts and the error types shared by the
//! realtime monitor and the daily consumption job.

pub mod error;
pub mod rows;
pub mod sensor;

pub use error::SensorError;
pub use rows::{
    day_bounds, ConsumptionRow, Row, SnapshotRow, DATE_COLUMN, DATE_FORMAT, TIMESTAMP_FORMAT,
};
pub use sensor::{is_valid_column, Sensor, SensorId, SensorTable};
