//! Supabase (PostgREST) table store over HTTP

use super::{validate_identifier, KeyRange, StoreError, TableStore};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use station_common::Row;

/// REST client for a Supabase project's table API
pub struct RestTableStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestTableStore {
    /// Creates a client for `https://<project>.supabase.co` with the given API key.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        log::info!("Creating REST table store client for {}", base_url);
        log::debug!("API key length: {}", api_key.len());
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder, StoreError> {
        validate_identifier(table)?;
        Ok(self
            .client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("User-Agent", "inventory_monitor/1.0"))
    }
}

/// Turn a non-2xx response into an error carrying the body
async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::HttpStatus { status, body })
}

#[async_trait]
impl TableStore for RestTableStore {
    async fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        log::debug!("POST {} ({} columns)", self.table_url(table), row.len());
        let response = self
            .request(Method::POST, table)?
            .json(row)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn upsert(&self, table: &str, row: &Row, on_conflict: &str) -> Result<(), StoreError> {
        validate_identifier(on_conflict)?;
        log::debug!(
            "POST {} on_conflict={} ({} columns)",
            self.table_url(table),
            on_conflict,
            row.len()
        );
        let response = self
            .request(Method::POST, table)?
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates")
            .json(row)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch_range(
        &self,
        table: &str,
        columns: &[&str],
        range: KeyRange<'_>,
    ) -> Result<Vec<Row>, StoreError> {
        validate_identifier(range.key)?;
        for column in columns {
            validate_identifier(column)?;
        }

        let select = columns.join(",");
        let from = format!("gte.{}", range.from);
        let to = format!("lte.{}", range.to);
        let order = format!("{}.asc", range.key);

        let response = self
            .request(Method::GET, table)?
            .query(&[
                ("select", select.as_str()),
                (range.key, from.as_str()),
                (range.key, to.as_str()),
                ("order", order.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.text().await?;
        let rows: Vec<Row> = serde_json::from_str(&body)?;
        log::debug!("Fetched {} rows from '{}'", rows.len(), table);
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("REST store at {}", self.base_url)
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
