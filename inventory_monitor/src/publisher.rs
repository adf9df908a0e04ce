//! Publishes inventory snapshots to the snapshot table
//!
//! Delivery is best effort: a failed insert is logged and reported to the
//! caller, which drops the snapshot and keeps reading.

use crate::inventory::SnapshotEvent;
use crate::store::{StoreError, TableStore};
use serde_json::Value;
use station_common::{SensorTable, SnapshotRow};
use std::sync::Arc;
use thiserror::Error;

/// A snapshot that did not reach the store
#[derive(Debug, Error)]
#[error("Failed to publish snapshot taken at {taken_at}: {source}")]
pub struct PublishError {
    pub taken_at: String,
    #[source]
    pub source: StoreError,
}

pub struct SnapshotPublisher {
    store: Arc<dyn TableStore>,
    table: String,
    sensors: SensorTable,
}

impl SnapshotPublisher {
    pub fn new(store: Arc<dyn TableStore>, table: &str, sensors: SensorTable) -> Self {
        Self {
            store,
            table: table.to_string(),
            sensors,
        }
    }

    /// Row for an event: timestamp plus one level per sensor column
    pub fn snapshot_row(&self, event: &SnapshotEvent) -> SnapshotRow {
        let levels = self
            .sensors
            .iter()
            .map(|sensor| {
                let level = event.levels.get(&sensor.id).copied().unwrap_or(0);
                (sensor.column.clone(), level)
            })
            .collect();
        SnapshotRow::new(event.taken_at, levels)
    }

    /// Insert one snapshot row
    pub async fn publish(&self, event: &SnapshotEvent) -> Result<(), PublishError> {
        let row = self.snapshot_row(event).to_row();
        log::info!("Uploading snapshot: {}", Value::Object(row.clone()));

        match self.store.insert(&self.table, &row).await {
            Ok(()) => {
                log::info!("Snapshot inserted into '{}'", self.table);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to insert snapshot into '{}': {}", self.table, e);
                Err(PublishError {
                    taken_at: event.taken_at.to_string(),
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteTableStore, Tables};
    use chrono::NaiveDate;
    use station_common::{Sensor, SensorId};
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(levels: &[(u8, i64)]) -> SnapshotEvent {
        SnapshotEvent {
            taken_at: NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            levels: levels
                .iter()
                .map(|(index, level)| (SensorId::new(*index), *level))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn sqlite_store() -> Arc<SqliteTableStore> {
        let store = SqliteTableStore::open_in_memory().unwrap();
        store
            .init_schema(&Tables::default(), &SensorTable::default())
            .unwrap();
        Arc::new(store)
    }

    #[test]
    fn row_uses_external_column_names() {
        let publisher =
            SnapshotPublisher::new(sqlite_store(), "stockdata", SensorTable::default());
        let row = publisher.snapshot_row(&event(&[(1, 245), (2, 0), (3, 17)]));

        assert_eq!(row.date, "2026-02-01 10:00:00");
        assert_eq!(row.levels["caramel_syrup"], 245);
        assert_eq!(row.levels["coffee_beans"], 0);
        assert_eq!(row.levels["chocolate_powder"], 17);
    }

    #[test]
    fn row_follows_custom_mapping() {
        let sensors =
            SensorTable::new(vec![Sensor::new(1, "oat_milk"), Sensor::new(2, "sugar")]).unwrap();
        let publisher = SnapshotPublisher::new(sqlite_store(), "stockdata", sensors);
        let row = publisher.snapshot_row(&event(&[(1, 5)]));

        assert_eq!(row.levels.len(), 2);
        assert_eq!(row.levels["oat_milk"], 5);
        assert_eq!(row.levels["sugar"], 0);
    }

    #[tokio::test]
    async fn publish_inserts_one_row_per_event() {
        let store = sqlite_store();
        let publisher = SnapshotPublisher::new(store.clone(), "stockdata", SensorTable::default());

        publisher.publish(&event(&[(1, 500)])).await.unwrap();
        publisher.publish(&event(&[(1, 480)])).await.unwrap();

        assert_eq!(store.row_count("stockdata").unwrap(), 2);
    }

    #[tokio::test]
    async fn publish_sends_row_to_rest_store() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/stockdata"))
            .and(body_json(serde_json::json!({
                "date": "2026-02-01 10:00:00",
                "caramel_syrup": 245,
                "coffee_beans": 0,
                "chocolate_powder": 0
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = Arc::new(crate::store::RestTableStore::new(
            &mock_server.uri(),
            "test_key",
        ));
        let publisher = SnapshotPublisher::new(store, "stockdata", SensorTable::default());
        publisher
            .publish(&event(&[(1, 245), (2, 0), (3, 0)]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publish_failure_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let store = Arc::new(crate::store::RestTableStore::new(
            &mock_server.uri(),
            "test_key",
        ));
        let publisher = SnapshotPublisher::new(store, "stockdata", SensorTable::default());
        let err = publisher.publish(&event(&[(1, 245)])).await.unwrap_err();

        assert_eq!(err.taken_at, "2026-02-01 10:00:00");
        assert!(matches!(err.source, StoreError::HttpStatus { .. }));
    }
}
