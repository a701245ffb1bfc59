//! Serializes the merged dataset and hands it to the store.

use tracing::info;

use crate::feature::{FeatureCollection, FeatureMap};
use crate::metrics_defs;
use crate::store::{FeatureStore, StoreError};

/// Publishes the merged dataset as a feature collection.
///
/// In dry-run mode the document is printed to stdout instead of written,
/// so a run can be inspected without side effects.
pub async fn publish(
    dataset: &FeatureMap,
    name: &str,
    store: &dyn FeatureStore,
    dry_run: bool,
) -> Result<(), StoreError> {
    let collection = FeatureCollection::from_map(dataset);
    if dry_run {
        info!(%name, features = collection.features.len(), "dry run; printing dataset");
        println!("{}", serde_json::to_string_pretty(&collection)?);
        return Ok(());
    }
    store.publish(name, &collection).await?;
    crate::counter!(metrics_defs::DATASETS_PUBLISHED).increment(1);
    Ok(())
}
