//! Identity key derivation.
//!
//! Every source row is reduced to a stable string key before it enters the
//! working sheet. The key is a pure function of the row's identity fields,
//! so a logically unchanged source record maps to the same dataset entry
//! on every run.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::feature::Properties;

/// Separator for compound `location::host` keys.
pub const COMPOUND_SEPARATOR: &str = "::";

/// Builds the compound key used when several hosts can share one location.
pub fn compound_key(location: &str, host: &str) -> String {
    format!("{}{}{}", location.trim(), COMPOUND_SEPARATOR, host.trim())
}

/// Recovers the location half of a key. Plain location keys pass through
/// unchanged; compound keys split on the first `"::"`.
pub fn location_part(key: &str) -> &str {
    match key.split_once(COMPOUND_SEPARATOR) {
        Some((location, _host)) => location,
        None => key,
    }
}

/// Per-source key derivation strategy.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum KeyStrategy {
    /// Key is the trimmed cell at `column`. Rows with an empty or missing
    /// location cell are rejected.
    Location { column: usize },
    /// Compound key from the normalized `location` and `host` properties.
    LocationHost,
    /// Hex SHA-256 over the listed row columns, in order. The trailing
    /// `optional_trailing` columns may be missing on a short row; a row
    /// that cannot supply the remaining identity columns is rejected.
    ContentHash {
        columns: Vec<usize>,
        #[serde(default)]
        optional_trailing: usize,
    },
}

impl KeyStrategy {
    /// Derives the key for one raw row, or `None` when the row carries no
    /// usable identity and must be skipped.
    pub fn derive(&self, row: &[String], properties: &Properties) -> Option<String> {
        match self {
            KeyStrategy::Location { column } => {
                let location = row.get(*column)?.trim();
                if location.is_empty() {
                    return None;
                }
                Some(location.to_string())
            }
            KeyStrategy::LocationHost => {
                let location = property_text(properties, "location")?;
                if location.is_empty() {
                    return None;
                }
                let host = property_text(properties, "host").unwrap_or_default();
                Some(compound_key(&location, &host))
            }
            KeyStrategy::ContentHash {
                columns,
                optional_trailing,
            } => {
                let required = columns.len().saturating_sub(*optional_trailing);
                if columns
                    .iter()
                    .take(required)
                    .any(|&column| column >= row.len())
                {
                    return None;
                }
                let mut hasher = Sha256::new();
                for &column in columns {
                    if let Some(cell) = row.get(column) {
                        hasher.update(cell.trim().as_bytes());
                    }
                }
                Some(hex::encode(hasher.finalize()))
            }
        }
    }

    /// Whether records from this strategy carry their key as a feature
    /// `id`. Hash keys cannot be rebuilt from the published properties, so
    /// they must be persisted explicitly.
    pub fn persists_id(&self) -> bool {
        matches!(self, KeyStrategy::ContentHash { .. })
    }
}

fn property_text(properties: &Properties, name: &str) -> Option<String> {
    properties
        .get(name)
        .and_then(|value| value.as_text())
        .map(|text| text.trim().to_string())
}
