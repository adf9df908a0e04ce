//! Local SQLite table store
//!
//! Table and column names come from configuration, so they are validated as
//! plain identifiers and quoted; all values are bound as parameters.

use super::{validate_identifier, KeyRange, StoreError, Tables, TableStore};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use station_common::{Row, SensorTable, DATE_COLUMN};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed store (one connection, serialized behind a mutex)
pub struct SqliteTableStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteTableStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        log::info!("Opened database: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            location: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            location: ":memory:".to_string(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize the database schema
    ///
    /// Creates tables if they don't exist:
    /// - snapshot table: one row per inventory change, `date` is a timestamp
    /// - consumption table: one row per day, keyed by `date`; `updated_at`
    ///   follows every upsert
    pub fn init_schema(&self, tables: &Tables, sensors: &SensorTable) -> Result<(), StoreError> {
        validate_identifier(&tables.snapshots)?;
        validate_identifier(&tables.consumption)?;

        let level_columns: String = sensors
            .columns()
            .map(|column| format!("\"{}\" INTEGER NOT NULL DEFAULT 0,\n", column))
            .collect();

        let sql = format!(
            "
            CREATE TABLE IF NOT EXISTS \"{snapshots}\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                \"{date}\" TEXT NOT NULL,
                {levels}
                inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS \"idx_{snapshots}_{date}\" ON \"{snapshots}\"(\"{date}\");

            CREATE TABLE IF NOT EXISTS \"{consumption}\" (
                \"{date}\" TEXT PRIMARY KEY,
                {levels}
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TRIGGER IF NOT EXISTS \"trg_{consumption}_updated_at\"
            AFTER UPDATE ON \"{consumption}\"
            WHEN NEW.updated_at IS OLD.updated_at
            BEGIN
                UPDATE \"{consumption}\" SET updated_at = datetime('now') WHERE rowid = NEW.rowid;
            END;
            ",
            snapshots = tables.snapshots,
            consumption = tables.consumption,
            date = DATE_COLUMN,
            levels = level_columns,
        );

        self.lock().execute_batch(&sql)?;
        log::info!("Database schema initialized");
        Ok(())
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> Result<i64, StoreError> {
        validate_identifier(table)?;
        let count = self.lock().query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", table),
            params![],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Quoted column list and bound values for a row
fn columns_and_values(row: &Row) -> Result<(Vec<String>, Vec<SqlValue>), StoreError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (column, value) in row {
        validate_identifier(column)?;
        columns.push(format!("\"{}\"", column));
        values.push(to_sql(value));
    }
    Ok((columns, values))
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Value::from(f),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        validate_identifier(table)?;
        let (columns, values) = columns_and_values(row)?;
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders(values.len())
        );
        self.lock()
            .prepare_cached(&sql)?
            .execute(params_from_iter(values))?;
        Ok(())
    }

    async fn upsert(&self, table: &str, row: &Row, on_conflict: &str) -> Result<(), StoreError> {
        validate_identifier(table)?;
        validate_identifier(on_conflict)?;
        let (columns, values) = columns_and_values(row)?;

        let key = format!("\"{}\"", on_conflict);
        let updates: Vec<String> = columns
            .iter()
            .filter(|column| **column != key)
            .map(|column| format!("{column} = excluded.{column}"))
            .collect();
        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) ON CONFLICT({}) {}",
            table,
            columns.join(", "),
            placeholders(values.len()),
            key,
            action
        );
        self.lock()
            .prepare_cached(&sql)?
            .execute(params_from_iter(values))?;
        Ok(())
    }

    async fn fetch_range(
        &self,
        table: &str,
        columns: &[&str],
        range: KeyRange<'_>,
    ) -> Result<Vec<Row>, StoreError> {
        validate_identifier(table)?;
        validate_identifier(range.key)?;
        for column in columns {
            validate_identifier(column)?;
        }

        let select = columns
            .iter()
            .map(|column| format!("\"{}\"", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select} FROM \"{table}\"
             WHERE \"{key}\" >= ?1 AND \"{key}\" <= ?2
             ORDER BY \"{key}\" ASC, rowid ASC",
            key = range.key,
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![range.from, range.to], |sql_row| {
                let mut row = Row::new();
                for (i, column) in columns.iter().enumerate() {
                    let value: SqlValue = sql_row.get(i)?;
                    row.insert(column.to_string(), from_sql(value));
                }
                Ok(row)
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;

        log::debug!("Fetched {} rows from '{}'", rows.len(), table);
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("SQLite database {}", self.location)
    }
}
