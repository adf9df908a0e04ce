//! Command line / environment configuration shared by both binaries
//!
//! Store credentials are read from `SUPABASE_URL` and `SUPABASE_KEY`
//! (a `.env` file is loaded first by the binaries).

use crate::clock::StationClock;
use crate::store::{
    RestTableStore, SqliteTableStore, StoreError, Tables, TableStore, CONSUMPTION_TABLE,
    SNAPSHOT_TABLE,
};
use chrono_tz::Tz;
use clap::{Args, ValueEnum};
use station_common::{Sensor, SensorError, SensorTable};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required setting not given on the command line or in the environment
    #[error("{0} is not set (command line, environment or .env file)")]
    MissingCredential(&'static str),
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Where rows are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Supabase REST table API
    Rest,
    /// Local SQLite database file
    Sqlite,
}

/// Store, sensor and clock settings
#[derive(Args, Debug, Clone)]
pub struct StationArgs {
    /// Table store backend
    #[arg(long, value_enum, env = "STORE_BACKEND", default_value_t = Backend::Rest)]
    pub backend: Backend,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Path to the SQLite database file (sqlite backend)
    #[arg(long, env = "INVENTORY_DB", default_value_t = default_db_path())]
    pub database: String,

    /// Table receiving one row per inventory change
    #[arg(long, default_value = SNAPSHOT_TABLE)]
    pub snapshot_table: String,

    /// Table receiving one consumption row per day
    #[arg(long, default_value = CONSUMPTION_TABLE)]
    pub consumption_table: String,

    /// Sensor to column mapping as <index>=<column> (repeatable, default: the three station loadcells)
    #[arg(long = "sensor", value_name = "INDEX=COLUMN")]
    pub sensors: Vec<Sensor>,

    /// Station time zone, e.g. Asia/Seoul (default: host local time)
    #[arg(long, env = "STATION_TIMEZONE")]
    pub timezone: Option<Tz>,
}

/// Returns the default database path: ~/.local/share/inventory_monitor/inventory.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inventory_monitor")
        .join("inventory.db")
        .to_string_lossy()
        .to_string()
}

impl StationArgs {
    pub fn sensor_table(&self) -> Result<SensorTable, ConfigError> {
        if self.sensors.is_empty() {
            return Ok(SensorTable::default());
        }
        Ok(SensorTable::new(self.sensors.clone())?)
    }

    pub fn tables(&self) -> Result<Tables, ConfigError> {
        Ok(Tables::new(&self.snapshot_table, &self.consumption_table)?)
    }

    pub fn clock(&self) -> StationClock {
        StationClock::new(self.timezone)
    }

    /// Open the configured store; SQLite tables are created if missing
    pub fn open_store(
        &self,
        tables: &Tables,
        sensors: &SensorTable,
    ) -> Result<Arc<dyn TableStore>, ConfigError> {
        match self.backend {
            Backend::Rest => {
                let url = non_empty(self.supabase_url.as_deref())
                    .ok_or(ConfigError::MissingCredential("SUPABASE_URL"))?;
                let key = non_empty(self.supabase_key.as_deref())
                    .ok_or(ConfigError::MissingCredential("SUPABASE_KEY"))?;
                Ok(Arc::new(RestTableStore::new(url, key)))
            }
            Backend::Sqlite => {
                let path = PathBuf::from(&self.database);
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                        log::info!("Created directory: {}", parent.display());
                    }
                }
                let store = SqliteTableStore::open(&path)?;
                store.init_schema(tables, sensors)?;
                Ok(Arc::new(store))
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        station: StationArgs,
    }

    fn parse(args: &[&str]) -> StationArgs {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().station
    }

    #[test]
    fn defaults_match_station_layout() {
        let args = parse(&["--backend", "sqlite"]);
        assert_eq!(args.backend, Backend::Sqlite);
        assert_eq!(args.snapshot_table, "stockdata");
        assert_eq!(args.consumption_table, "daily_inventory_consumption2");
        assert_eq!(args.sensor_table().unwrap(), SensorTable::default());
        assert!(args.database.ends_with("inventory.db"));
    }

    #[test]
    fn sensor_mapping_overrides_default() {
        let args = parse(&["--sensor", "1=oat_milk", "--sensor", "2=sugar"]);
        let sensors = args.sensor_table().unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors.column(station_common::SensorId::new(1)), Some("oat_milk"));
    }

    #[test]
    fn duplicate_sensor_mapping_is_rejected() {
        let args = parse(&["--sensor", "1=a", "--sensor", "1=b"]);
        assert!(matches!(
            args.sensor_table(),
            Err(ConfigError::Sensor(SensorError::DuplicateSensor(1)))
        ));
    }

    #[test]
    fn malformed_sensor_mapping_fails_parsing() {
        let result = TestCli::try_parse_from(["test", "--sensor", "caramel"]);
        assert!(result.is_err());
    }

    #[test]
    fn timezone_is_parsed() {
        let args = parse(&["--timezone", "Asia/Seoul"]);
        assert_eq!(args.timezone, Some(chrono_tz::Asia::Seoul));
        assert!(TestCli::try_parse_from(["test", "--timezone", "Mars/Olympus"]).is_err());
    }

    #[test]
    fn rest_backend_requires_credentials() {
        let mut args = parse(&["--backend", "rest"]);
        args.supabase_url = None;
        args.supabase_key = Some("key".to_string());
        let tables = args.tables().unwrap();
        let result = args.open_store(&tables, &SensorTable::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingCredential("SUPABASE_URL"))
        ));

        args.supabase_url = Some("https://example.supabase.co".to_string());
        args.supabase_key = Some("  ".to_string());
        let result = args.open_store(&tables, &SensorTable::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingCredential("SUPABASE_KEY"))
        ));
    }

    #[test]
    fn sqlite_backend_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("inventory.db");

        let mut args = parse(&["--backend", "sqlite"]);
        args.database = db_path.to_string_lossy().to_string();

        let tables = args.tables().unwrap();
        let store = args.open_store(&tables, &SensorTable::default()).unwrap();
        assert!(db_path.exists());
        assert!(store.describe().contains("inventory.db"));
    }

    #[test]
    fn invalid_table_name_is_rejected() {
        let args = parse(&["--snapshot-table", "stock data"]);
        assert!(matches!(
            args.tables(),
            Err(ConfigError::Store(StoreError::InvalidIdentifier(_)))
        ));
    }
}
