//! Row normalization: raw spreadsheet rows into keyed, canonical records.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::feature::{Feature, FeatureMap, Properties, PropertyValue};
use crate::key::{self, KeyStrategy};
use crate::metrics_defs;

/// Output property name → source column index.
pub type FieldMap = BTreeMap<String, usize>;

/// How a record with no `name` gets one synthesized.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NameBackfill {
    /// `"<location> Event"`, from the key's location part.
    #[default]
    LocationEvent,
    /// `"<city> Event"`, for hash-keyed sources whose key is opaque.
    CityEvent,
}

/// Declarative description of one spreadsheet source.
#[derive(Clone, Debug, Deserialize)]
pub struct SheetSpec {
    /// Values range to request, e.g. `Sheet1!A1:M`. The first row is a
    /// header and is never normalized.
    pub range: String,
    /// The recognized properties for this source and where each comes
    /// from. Anything not listed here never enters a record.
    pub fields: FieldMap,
    pub key: KeyStrategy,
    /// Properties seeded on every record before the row is applied, e.g.
    /// the `source` tag and the `affiliate` flag.
    #[serde(default)]
    pub seed: Properties,
    #[serde(default)]
    pub name_backfill: NameBackfill,
}

/// Coerces one trimmed cell: the literals `Y`/`N` become flags, anything
/// else stays text.
fn coerce(value: &str) -> PropertyValue {
    match value {
        "Y" => PropertyValue::Flag(true),
        "N" => PropertyValue::Flag(false),
        other => PropertyValue::Text(other.to_string()),
    }
}

/// Normalizes a fetched values range into a keyed sheet.
///
/// Rows that cannot supply their identity fields are skipped with a
/// warning; every other declared field falls back to the empty string.
pub fn normalize_rows(values: &[Vec<String>], spec: &SheetSpec) -> FeatureMap {
    let mut sheet = FeatureMap::new();
    for (index, row) in values.iter().skip(1).enumerate() {
        let mut properties = spec.seed.clone();
        for field in spec.fields.keys() {
            properties.insert(field.clone(), PropertyValue::Text(String::new()));
        }
        for (field, &column) in &spec.fields {
            if let Some(cell) = row.get(column) {
                properties.insert(field.clone(), coerce(cell.trim()));
            }
        }

        let Some(key) = spec.key.derive(row, &properties) else {
            warn!(row = index, "skipping row: no identity");
            crate::counter!(metrics_defs::SHEET_ROWS_SKIPPED).increment(1);
            continue;
        };

        backfill_name(&mut properties, &key, spec.name_backfill);

        let mut feature = Feature::new(properties);
        if spec.key.persists_id() {
            feature.id = Some(key.clone());
        }
        debug!(row = index, %key, "normalized row");
        sheet.insert(key, feature);
    }
    crate::counter!(metrics_defs::SHEET_ROWS_READ).increment(sheet.len() as u64);
    sheet
}

fn backfill_name(properties: &mut Properties, key: &str, backfill: NameBackfill) {
    let missing = properties.get("name").is_none_or(PropertyValue::is_blank);
    if !missing {
        return;
    }
    let base = match backfill {
        NameBackfill::LocationEvent => key::location_part(key).to_string(),
        NameBackfill::CityEvent => properties
            .get("city")
            .and_then(|v| v.as_text())
            .unwrap_or_default()
            .to_string(),
    };
    properties.insert("name".to_string(), PropertyValue::Text(format!("{base} Event")));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SheetSpec {
        serde_yaml::from_str(
            r#"
range: Sheet1!A1:M
fields:
  name: 0
  eventDate: 1
  eventLink: 2
  location: 3
  host: 4
  affiliate: 5
key:
  strategy: location
  column: 3
seed:
  source: events
  affiliate: false
"#,
        )
        .unwrap()
    }

    fn values(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_normalize_trims_coerces_and_defaults() {
        let values = values(&[
            &["Name", "Date", "Link", "Location", "Host", "Affiliate?"],
            &["March On Akron ", "6/1", "", " Akron, OH ", "Jo", "Y"],
        ]);
        let sheet = normalize_rows(&values, &spec());
        assert_eq!(sheet.len(), 1);

        let feature = &sheet["Akron, OH"];
        assert_eq!(feature.property_text("name"), Some("March On Akron"));
        assert_eq!(feature.property_text("location"), Some("Akron, OH"));
        assert_eq!(
            feature.properties.get("affiliate"),
            Some(&PropertyValue::Flag(true))
        );
        // Declared but absent column defaults to the empty string.
        assert_eq!(feature.property_text("eventLink"), Some(""));
        assert_eq!(feature.property_text("source"), Some("events"));
        assert!(feature.id.is_none());
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn test_normalize_skips_rows_without_location() {
        let values = values(&[
            &["header"],
            &["No Location Event", "6/1", "", "  "],
            &["Short row"],
        ]);
        let sheet = normalize_rows(&values, &spec());
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_name_backfill_from_location() {
        let values = values(&[
            &["header"],
            &["", "6/1", "", "New Paltz, NY", "March On Hudson Valley"],
        ]);
        let sheet = normalize_rows(&values, &spec());
        let feature = &sheet["New Paltz, NY"];
        assert_eq!(feature.property_text("name"), Some("New Paltz, NY Event"));
    }

    #[test]
    fn test_name_backfill_from_city_for_hash_keys() {
        let spec: SheetSpec = serde_yaml::from_str(
            r#"
range: A1:Z
fields:
  name: 1
  address: 2
  city: 3
  state: 4
key:
  strategy: content_hash
  columns: [1, 2, 3, 4]
  optional_trailing: 1
name_backfill: city_event
"#,
        )
        .unwrap();
        let values = values(&[
            &["header"],
            &["row", "", "1 Main St", "Columbus", "OH"],
        ]);
        let sheet = normalize_rows(&values, &spec);
        assert_eq!(sheet.len(), 1);
        let feature = sheet.values().next().unwrap();
        assert_eq!(feature.property_text("name"), Some("Columbus Event"));
        // Hash-keyed records persist their key as the feature id.
        assert_eq!(feature.id.as_deref(), sheet.keys().next().map(String::as_str));
    }

    #[test]
    fn test_y_n_only_exact_literals_coerce() {
        assert_eq!(coerce("Y"), PropertyValue::Flag(true));
        assert_eq!(coerce("N"), PropertyValue::Flag(false));
        assert_eq!(coerce("Yes"), PropertyValue::Text("Yes".to_string()));
        assert_eq!(coerce("n"), PropertyValue::Text("n".to_string()));
    }
}
