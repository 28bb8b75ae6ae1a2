// Remote spreadsheet values API (GET /v4/spreadsheets/{id}/values/{range})

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::instrument;

use super::{DataSource, RawRow, rows_from_body, unavailable};
use crate::error::{Result, SourceError};

pub struct SheetsSource {
    client: Client,
    base_url: String,
    sheet_id: String,
    api_key: String,
    range: String,
}

impl SheetsSource {
    pub fn new(client: Client, base_url: &str, sheet_id: &str, api_key: &str, range: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            sheet_id: sheet_id.to_string(),
            api_key: api_key.to_string(),
            range: range.to_string(),
        }
    }

    /// Values endpoint without the query string (the key never appears here).
    pub fn values_url(&self) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.sheet_id.as_str(),
                "values",
                self.range.as_str(),
            ]);
        Ok(url)
    }

    #[instrument(skip(self), fields(backend = "sheets", operation = "fetch_all_rows"))]
    async fn try_fetch(&self) -> Result<Vec<RawRow>> {
        let url = self.values_url()?;
        // without_url: reqwest errors would otherwise log the access key.
        let response = self
            .client
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::Http(e.without_url()))?;
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(e.without_url()))?;
        let rows = rows_from_body(&body)?;
        tracing::debug!(rows = rows.len(), "sheet values fetched");
        Ok(rows)
    }
}

#[async_trait]
impl DataSource for SheetsSource {
    fn name(&self) -> &'static str {
        "sheets"
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
