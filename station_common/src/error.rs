//! Error types for station configuration

use thiserror::Error;

/// Invalid sensor configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SensorError {
    /// `--sensor` value is not `<index>=<column>`
    #[error("Invalid sensor mapping '{0}', expected <index>=<column>")]
    InvalidMapping(String),
    /// Column name is not a plain identifier
    #[error("Invalid column name '{0}'")]
    InvalidColumn(String),
    /// Column name collides with the timestamp column
    #[error("Column name '{0}' is reserved")]
    ReservedColumn(String),
    /// Same sensor index configured twice
    #[error("Sensor index {0} configured more than once")]
    DuplicateSensor(u8),
    /// Same column used by two sensors
    #[error("Column '{0}' mapped to more than one sensor")]
    DuplicateColumn(String),
    /// No sensors configured at all
    #[error("At least one sensor must be configured")]
    Empty,
}
