//! Spreadsheet values client.
//!
//! Reads a values range from a Sheets-style API. The column-to-field
//! mapping lives in [`crate::normalize::SheetSpec`]; this client only
//! fetches the raw rows.

use serde::Deserialize;
use tracing::info;

use super::SourceError;

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct SheetClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SheetClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        SheetClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Fetches one values range. Any failure is fatal for the run; a
    /// partial sheet is never used.
    pub async fn values(
        &self,
        sheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SourceError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url.trim_end_matches('/'),
            sheet_id,
            range
        );

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status(),
                url,
            });
        }

        let range = response.json::<ValueRange>().await?;
        info!(rows = range.values.len(), "fetched sheet values");
        Ok(range.values)
    }
}
