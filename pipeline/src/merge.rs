//! Dataset reconciliation.
//!
//! Merges the freshly built sheet into the previously published dataset:
//! unchanged records are left alone, changed records get their properties
//! overlaid, new records are inserted, and anything without geometry or
//! without a surviving sheet key is removed before publish.

use indexmap::map::Entry;
use serde::Deserialize;
use tracing::{debug, info};

use crate::feature::{FeatureMap, FEATURE_TYPE};
use crate::metrics_defs;

/// What to do with dataset entries whose key no longer appears in the
/// sheet.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum OrphanPolicy {
    /// Remove every orphan. The right choice when one pipeline owns the
    /// whole dataset.
    #[default]
    DeleteAll,
    /// Remove an orphan only when its `source` property matches, so
    /// independent pipelines can share one dataset without deleting each
    /// other's records.
    MatchingSource { source: String },
}

impl OrphanPolicy {
    fn applies_to(&self, feature: &crate::feature::Feature) -> bool {
        match self {
            OrphanPolicy::DeleteAll => true,
            OrphanPolicy::MatchingSource { source } => {
                feature.property_text("source") == Some(source.as_str())
            }
        }
    }
}

/// Merges `sheet` into `dataset` in place.
///
/// Afterwards `dataset` holds exactly the sheet keys that carry geometry,
/// plus any orphans the policy protects. Re-merging the same sheet is a
/// fixed point.
pub fn merge(sheet: &FeatureMap, dataset: &mut FeatureMap, orphan_policy: &OrphanPolicy) {
    for (key, incoming) in sheet {
        match dataset.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().properties == incoming.properties {
                    debug!(%key, "unchanged");
                    continue;
                }
                info!(%key, "updating");
                // Per-field overlay: sheet values win, fields the sheet
                // does not carry (placeName, geocode artifacts) are
                // preserved.
                let existing = entry.get_mut();
                existing
                    .properties
                    .extend(incoming.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                existing.feature_type = Some(FEATURE_TYPE.to_string());
                if existing.geometry.is_none() {
                    info!(%key, "missing geometry; deleting");
                    entry.shift_remove();
                }
            }
            Entry::Vacant(entry) => {
                let mut feature = incoming.clone();
                feature.feature_type = Some(FEATURE_TYPE.to_string());
                if feature.geometry.is_none() {
                    info!(%key, "missing geometry; deleting");
                    continue;
                }
                info!(%key, "inserting");
                entry.insert(feature);
            }
        }
    }

    let orphans: Vec<String> = dataset
        .iter()
        .filter(|(key, feature)| !sheet.contains_key(*key) && orphan_policy.applies_to(feature))
        .map(|(key, _)| key.clone())
        .collect();
    info!(count = orphans.len(), keys = ?orphans, "removing orphans");
    crate::counter!(metrics_defs::MERGE_ORPHANS_REMOVED).increment(orphans.len() as u64);
    for key in &orphans {
        dataset.shift_remove(key);
    }
}
