//! Daily consumption from the day's inventory snapshots
//!
//! Consumption is the sum of successive decreases per sensor. Increases are
//! restocking and count as zero, not as negative consumption.

use crate::store::{KeyRange, StoreError, Tables, TableStore};
use chrono::NaiveDate;
use serde_json::Value;
use station_common::{day_bounds, ConsumptionRow, Row, SensorTable, DATE_COLUMN};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed to fetch snapshots from '{table}': {source}")]
    Fetch {
        table: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to upsert consumption into '{table}': {source}")]
    Upsert {
        table: String,
        #[source]
        source: StoreError,
    },
}

/// Result of one aggregation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOutcome {
    /// Fewer than two snapshots that day, nothing was written
    NotEnoughData { rows: usize },
    /// Consumption row upserted
    Uploaded(ConsumptionRow),
}

/// Sum of decreases between successive levels; gaps contribute nothing
///
/// Saturates at `i64::MAX` instead of overflowing on corrupt rows.
pub fn consumption(levels: &[Option<i64>]) -> i64 {
    levels
        .windows(2)
        .map(|pair| match (pair[0], pair[1]) {
            (Some(previous), Some(current)) => previous.saturating_sub(current).max(0),
            _ => 0,
        })
        .fold(0i64, i64::saturating_add)
}

fn level(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        _ => None,
    }
}

/// Consumption row for `day` from its snapshot rows (in timestamp order)
pub fn daily_consumption(day: NaiveDate, rows: &[Row], sensors: &SensorTable) -> ConsumptionRow {
    let totals: BTreeMap<String, i64> = sensors
        .columns()
        .map(|column| {
            let levels: Vec<Option<i64>> = rows.iter().map(|row| level(row, column)).collect();
            (column.to_string(), consumption(&levels))
        })
        .collect();
    ConsumptionRow::new(day, totals)
}

/// Fetch the day's snapshots, compute consumption and upsert it keyed by date
pub async fn aggregate_day(
    store: &dyn TableStore,
    tables: &Tables,
    sensors: &SensorTable,
    day: NaiveDate,
) -> Result<AggregateOutcome, AggregateError> {
    let (from, to) = day_bounds(day);
    log::info!(
        "Fetching snapshots for {} from '{}' ({})",
        day,
        tables.snapshots,
        store.describe()
    );

    let mut columns = vec![DATE_COLUMN];
    columns.extend(sensors.columns());

    let range = KeyRange {
        key: DATE_COLUMN,
        from: &from,
        to: &to,
    };
    let mut rows = store
        .fetch_range(&tables.snapshots, &columns, range)
        .await
        .map_err(|source| AggregateError::Fetch {
            table: tables.snapshots.clone(),
            source,
        })?;

    if rows.len() < 2 {
        log::info!(
            "Only {} snapshot(s) for {}, not enough to compute consumption",
            rows.len(),
            day
        );
        return Ok(AggregateOutcome::NotEnoughData { rows: rows.len() });
    }

    rows.sort_by(|a, b| {
        let a = a.get(DATE_COLUMN).and_then(Value::as_str);
        let b = b.get(DATE_COLUMN).and_then(Value::as_str);
        a.cmp(&b)
    });
    log::info!("Loaded {} snapshots for {}", rows.len(), day);

    let result = daily_consumption(day, &rows, sensors);
    log::info!(
        "Uploading consumption to '{}': {}",
        tables.consumption,
        Value::Object(result.to_row())
    );

    store
        .upsert(&tables.consumption, &result.to_row(), DATE_COLUMN)
        .await
        .map_err(|source| AggregateError::Upsert {
            table: tables.consumption.clone(),
            source,
        })?;

    log::info!("Consumption for {} upserted into '{}'", day, tables.consumption);
    Ok(AggregateOutcome::Uploaded(result))
}
