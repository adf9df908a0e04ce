//! Table store used for snapshot and consumption rows
//!
//! Two backends share one trait: the hosted REST table store (Supabase /
//! PostgREST) and a local SQLite file for stations without connectivity.

mod rest;
mod sqlite;

pub use rest::RestTableStore;
pub use sqlite::SqliteTableStore;

use async_trait::async_trait;
use station_common::{is_valid_column, Row};
use thiserror::Error;

/// Default table holding one row per inventory change
pub const SNAPSHOT_TABLE: &str = "stockdata";

/// Default table holding one consumption row per day
pub const CONSUMPTION_TABLE: &str = "daily_inventory_consumption2";

/// Errors from table store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failed to parse a response body
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Store answered with an error status
    #[error("HTTP error: {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Table or column name is not a plain identifier
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),
}

/// Names of the two tables the station writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub snapshots: String,
    pub consumption: String,
}

impl Tables {
    pub fn new(snapshots: &str, consumption: &str) -> Result<Self, StoreError> {
        validate_identifier(snapshots)?;
        validate_identifier(consumption)?;
        Ok(Self {
            snapshots: snapshots.to_string(),
            consumption: consumption.to_string(),
        })
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            snapshots: SNAPSHOT_TABLE.to_string(),
            consumption: CONSUMPTION_TABLE.to_string(),
        }
    }
}

/// Inclusive range over one key column
#[derive(Debug, Clone, Copy)]
pub struct KeyRange<'a> {
    pub key: &'a str,
    pub from: &'a str,
    pub to: &'a str,
}

/// Row store with append, upsert-by-key and ranged reads
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Append a row
    async fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError>;

    /// Insert a row, or update the existing row with the same `on_conflict` value
    async fn upsert(&self, table: &str, row: &Row, on_conflict: &str) -> Result<(), StoreError>;

    /// Fetch `columns` of all rows with `range.key` inside the range, ordered by key ascending
    async fn fetch_range(
        &self,
        table: &str,
        columns: &[&str],
        range: KeyRange<'_>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Human readable location for log lines
    fn describe(&self) -> String;
}

pub(crate) fn validate_identifier(name: &str) -> Result<(), StoreError> {
    if is_valid_column(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
