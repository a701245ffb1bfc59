//! Per-job orchestration: sources → sheet → geocode → merge → publish.

use serde::Deserialize;
use tracing::info;

use crate::feature::FeatureMap;
use crate::geocode::Geocoder;
use crate::merge::{merge, OrphanPolicy};
use crate::normalize::{normalize_rows, SheetSpec};
use crate::publish::publish;
use crate::sources::{CampaignClient, SheetClient, SourceError};
use crate::store::{FeatureStore, StoreError};

/// One spreadsheet feeding a job.
#[derive(Clone, Debug, Deserialize)]
pub struct SheetSource {
    pub sheet_id: String,
    #[serde(flatten)]
    pub spec: SheetSpec,
}

/// One events campaign feeding a job.
#[derive(Clone, Debug, Deserialize)]
pub struct CampaignSource {
    pub campaign_id: String,
}

/// A configured synchronization job: which sources build the sheet and
/// which stored object they reconcile against.
#[derive(Clone, Debug, Deserialize)]
pub struct JobSpec {
    pub name: String,
    /// Object name of the persisted dataset, e.g. `events.json`.
    pub object: String,
    #[serde(default)]
    pub sheets: Vec<SheetSource>,
    #[serde(default)]
    pub campaign: Option<CampaignSource>,
    #[serde(default)]
    pub orphans: OrphanPolicy,
}

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("source read failed: {0}")]
    Source(#[from] SourceError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("job references an events campaign but no campaign client is configured")]
    MissingCampaignClient,
}

/// The assembled pipeline for one process invocation. Jobs run one at a
/// time; nothing here is shared across concurrent runs.
pub struct Pipeline {
    pub sheets: SheetClient,
    pub campaigns: Option<CampaignClient>,
    pub geocoder: Geocoder,
    pub store: Box<dyn FeatureStore>,
    pub dry_run: bool,
}

impl Pipeline {
    /// Runs one job to completion. Local failures (bad rows, unresolvable
    /// keys) are logged and skipped; source and store failures abort the
    /// job with nothing published.
    pub async fn run(&self, job: &JobSpec) -> Result<(), SyncError> {
        info!(job = %job.name, "starting sync");

        let mut sheet = FeatureMap::new();
        for source in &job.sheets {
            let values = self.sheets.values(&source.sheet_id, &source.spec.range).await?;
            let rows = normalize_rows(&values, &source.spec);
            info!(job = %job.name, rows = rows.len(), "normalized sheet rows");
            sheet.extend(rows);
        }
        if let Some(campaign) = &job.campaign {
            let client = self
                .campaigns
                .as_ref()
                .ok_or(SyncError::MissingCampaignClient)?;
            let events = client.events(&campaign.campaign_id).await;
            info!(job = %job.name, events = events.len(), "campaign events");
            // Later sources win on key collisions.
            sheet.extend(events);
        }

        let mut dataset = self.store.fetch(&job.object).await?.into_keyed();

        // Only keys the dataset has never seen are geocoded; geometry is
        // immutable once set.
        let unresolved: Vec<String> = sheet
            .keys()
            .filter(|key| !dataset.contains_key(*key))
            .cloned()
            .collect();
        if !unresolved.is_empty() {
            info!(job = %job.name, keys = unresolved.len(), "geocoding new keys");
            self.geocoder.resolve_missing(&mut sheet, &unresolved).await;
        }

        merge(&sheet, &mut dataset, &job.orphans);
        publish(&dataset, &job.object, self.store.as_ref(), self.dry_run).await?;

        info!(job = %job.name, features = dataset.len(), "sync complete");
        Ok(())
    }
}
