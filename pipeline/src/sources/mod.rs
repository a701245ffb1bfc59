//! Source clients: spreadsheet values and the events-campaign API.

pub mod campaign;
pub mod sheet;

pub use campaign::CampaignClient;
pub use sheet::SheetClient;

/// Failure reading a source. Spreadsheet reads treat this as fatal for the
/// run; the campaign client degrades to an empty result set instead.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("source request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source returned status {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}
