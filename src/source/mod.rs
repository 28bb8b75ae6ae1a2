// Data sources: remote spreadsheet values API and a regenerated JSON snapshot.
// Both yield the same raw-row shape; any failure is "no data", never an error to the caller.

mod sheets;
mod snapshot;

pub use sheets::SheetsSource;
pub use snapshot::SnapshotSource;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{SourceConfig, SourceKind};
use crate::error::{Result, SourceError};
use crate::parser::record_to_cells;

/// One data row as positional cell values.
pub type RawRow = Vec<Value>;

#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// One attempt. `None` means unavailable; retrying is the caller's poll interval.
    async fn fetch_all_rows(&self) -> Option<Vec<RawRow>>;
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Option<Vec<Value>>,
}

/// Parses a `{"values": [...]}` body. Array rows start with a header row, which is dropped;
/// object rows carry their own keys and are mapped positionally. Scalar rows are skipped.
pub(crate) fn rows_from_body(body: &str) -> Result<Vec<RawRow>> {
    let response: ValuesResponse = serde_json::from_str(body)?;
    let values = response
        .values
        .filter(|v| !v.is_empty())
        .ok_or(SourceError::MissingValues)?;

    let mut rows = values.into_iter().peekable();
    if matches!(rows.peek(), Some(Value::Array(_))) {
        rows.next();
    }
    Ok(rows
        .filter_map(|row| match row {
            Value::Array(cells) => Some(cells),
            Value::Object(record) => Some(record_to_cells(&record)),
            _ => None,
        })
        .collect())
}

pub(crate) fn unavailable(backend: &'static str, e: &SourceError) {
    tracing::warn!(
        error = %e,
        backend,
        operation = "fetch_all_rows",
        "data source unavailable"
    );
}

/// Builds the configured backend with a shared HTTP client (request timeout applied).
pub fn from_config(config: &SourceConfig) -> anyhow::Result<Arc<dyn DataSource>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .build()?;
    let source: Arc<dyn DataSource> = match config.kind {
        SourceKind::Sheets => Arc::new(SheetsSource::new(
            client,
            &config.base_url,
            &config.sheet_id,
            &config.api_key,
            &config.range,
        )),
        SourceKind::Snapshot => Arc::new(SnapshotSource::new(client, &config.snapshot_location)),
    };
    tracing::info!(backend = source.name(), "data source configured");
    Ok(source)
}
