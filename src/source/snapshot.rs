// Periodically regenerated snapshot (same `values` shape), over HTTP or from disk

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use super::{DataSource, RawRow, rows_from_body, unavailable};
use crate::error::Result;

pub struct SnapshotSource {
    client: Client,
    location: String,
}

impl SnapshotSource {
    /// `location` is an http(s) URL or a filesystem path.
    pub fn new(client: Client, location: &str) -> Self {
        Self {
            client,
            location: location.to_string(),
        }
    }

    fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    #[instrument(skip(self), fields(backend = "snapshot", location = %self.location))]
    async fn try_fetch(&self) -> Result<Vec<RawRow>> {
        let body = if self.is_remote() {
            // Cache buster so static hosts never hand back a stale copy.
            let t = chrono::Utc::now().timestamp_millis();
            self.client
                .get(&self.location)
                .query(&[("t", t)])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?
        } else {
            tokio::fs::read_to_string(&self.location).await?
        };
        rows_from_body(&body)
    }
}

#[async_trait]
impl DataSource for SnapshotSource {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn fetch_all_rows(&self) -> Option<Vec<RawRow>> {
        match self.try_fetch().await {
            Ok(rows) => Some(rows),
            Err(e) => {
                unavailable(self.name(), &e);
                None
            }
        }
    }
}
