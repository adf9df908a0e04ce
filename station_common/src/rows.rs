//! Row layouts for the snapshot and consumption tables
//!
//! Both tables key on a `date` column followed by one integer column per
//! sensor. Snapshot rows carry a full timestamp, consumption rows a day.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A table row as sent to / read from a store
pub type Row = serde_json::Map<String, Value>;

/// Key column shared by both tables
pub const DATE_COLUMN: &str = "date";

/// Snapshot timestamp format (`2026-10-19 14:03:07`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Consumption row date format (`2026-10-19`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One inventory snapshot: every sensor level at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub date: String,
    #[serde(flatten)]
    pub levels: BTreeMap<String, i64>,
}

impl SnapshotRow {
    pub fn new(taken_at: NaiveDateTime, levels: BTreeMap<String, i64>) -> Self {
        Self {
            date: taken_at.format(TIMESTAMP_FORMAT).to_string(),
            levels,
        }
    }

    pub fn to_row(&self) -> Row {
        to_row(&self.date, &self.levels)
    }
}

/// Total consumption per sensor for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRow {
    pub date: String,
    #[serde(flatten)]
    pub consumption: BTreeMap<String, i64>,
}

impl ConsumptionRow {
    pub fn new(day: NaiveDate, consumption: BTreeMap<String, i64>) -> Self {
        Self {
            date: day.format(DATE_FORMAT).to_string(),
            consumption,
        }
    }

    pub fn to_row(&self) -> Row {
        to_row(&self.date, &self.consumption)
    }
}

fn to_row(date: &str, values: &BTreeMap<String, i64>) -> Row {
    let mut row = Row::new();
    row.insert(DATE_COLUMN.to_string(), Value::from(date));
    for (column, value) in values {
        row.insert(column.clone(), Value::from(*value));
    }
    row
}

/// First and last snapshot timestamp of a calendar day, inclusive
pub fn day_bounds(day: NaiveDate) -> (String, String) {
    let date = day.format(DATE_FORMAT);
    (format!("{} 00:00:00", date), format!("{} 23:59:59", date))
}
