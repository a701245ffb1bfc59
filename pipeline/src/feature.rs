//! GeoJSON-flavored record model shared by every stage of the pipeline.
//!
//! A [`Feature`] is one mappable record. Between the source read and the
//! merge it may lack `geometry` and its `type` marker; the merger
//! guarantees both before anything is published.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::key;

/// The `type` value stamped on every published feature.
pub const FEATURE_TYPE: &str = "Feature";

/// Source tag of records that come from the events-campaign API. Those
/// records are keyed by `location::host` so one location can hold several
/// events with different hosts.
pub const CAMPAIGN_SOURCE_TAG: &str = "actionnetwork";

/// Geometry is opaque to the pipeline; it is carried verbatim from the
/// geocoder to the published document.
pub type Geometry = JsonValue;

/// A single property value. Spreadsheet cells holding the literals `Y`/`N`
/// are coerced to flags at normalization time; everything else is text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Text(String),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Flag(_) => None,
        }
    }

    /// True for the empty-string default, false for flags and real text.
    pub fn is_blank(&self) -> bool {
        matches!(self, PropertyValue::Text(s) if s.is_empty())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Flag(value)
    }
}

/// Ordered property map. BTreeMap keeps serialization deterministic and
/// makes the merger's deep-equality check a plain `==`.
pub type Properties = BTreeMap<String, PropertyValue>;

/// One record of a dataset or working sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// `"Feature"` on anything published; absent on freshly normalized rows
    /// until the merger stamps it.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub feature_type: Option<String>,
    /// Stable identifier for content-hash keyed sources, where the key
    /// cannot be rebuilt from the properties alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(properties: Properties) -> Self {
        Feature {
            feature_type: None,
            id: None,
            properties,
            geometry: None,
        }
    }

    /// Text value of a property, `None` for flags and missing entries.
    pub fn property_text(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_text)
    }
}

/// Key→feature map used for both the ephemeral sheet and the durable
/// dataset. Insertion order is kept so republishing unchanged data writes
/// equivalent bytes.
pub type FeatureMap = IndexMap<String, Feature>;

/// The persisted document shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        FeatureCollection {
            collection_type: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    pub fn from_map(map: &FeatureMap) -> Self {
        FeatureCollection {
            collection_type: "FeatureCollection".to_string(),
            features: map.values().cloned().collect(),
        }
    }

    /// Rebuilds the key→feature map from a fetched document.
    ///
    /// A feature that carries an `id` keeps it as its key. Otherwise
    /// campaign-sourced features get the compound `location::host` key and
    /// everything else is keyed by its `location` property. Features with
    /// no usable key are dropped with a warning rather than clobbering
    /// each other under an empty key.
    pub fn into_keyed(self) -> FeatureMap {
        let mut map = FeatureMap::new();
        for feature in self.features {
            let key = if let Some(id) = &feature.id {
                id.clone()
            } else if feature.property_text("source") == Some(CAMPAIGN_SOURCE_TAG) {
                key::compound_key(
                    feature.property_text("location").unwrap_or_default(),
                    feature.property_text("host").unwrap_or_default(),
                )
            } else {
                feature.property_text("location").unwrap_or_default().to_string()
            };
            if key.is_empty() {
                tracing::warn!("dropping persisted feature with no derivable key");
                continue;
            }
            map.insert(key, feature);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_property_value_coercion_round_trip() {
        let json = r#"{"affiliate": true, "name": "March On Foo"}"#;
        let parsed: Properties = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.get("affiliate"), Some(&PropertyValue::Flag(true)));
        assert_eq!(
            parsed.get("name"),
            Some(&PropertyValue::Text("March On Foo".to_string()))
        );

        let back = serde_json::to_string(&parsed).unwrap();
        assert_eq!(back, r#"{"affiliate":true,"name":"March On Foo"}"#);
    }

    #[test]
    fn test_into_keyed_prefers_id_then_source_tag() {
        let collection: FeatureCollection = serde_json::from_str(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "properties": {
                            "source": "events",
                            "location": "New Paltz, NY",
                            "host": "March On Hudson Valley"
                        }
                    },
                    {
                        "properties": {
                            "source": "actionnetwork",
                            "host": "Mark Langgin",
                            "location": "Des Moines, IA 50312"
                        }
                    },
                    {
                        "id": "deadbeef",
                        "properties": {"location": "ignored"}
                    }
                ]
            }"#,
        )
        .unwrap();

        let keyed = collection.into_keyed();
        assert_eq!(keyed.len(), 3);
        assert!(keyed.contains_key("New Paltz, NY"));
        assert!(keyed.contains_key("Des Moines, IA 50312::Mark Langgin"));
        assert!(keyed.contains_key("deadbeef"));
    }

    #[test]
    fn test_into_keyed_drops_unkeyable() {
        let collection = FeatureCollection {
            collection_type: "FeatureCollection".to_string(),
            features: vec![Feature::new(props(&[("name", "no location here")]))],
        };
        assert!(collection.into_keyed().is_empty());
    }

    #[test]
    fn test_feature_serialization_omits_missing_fields() {
        let feature = Feature::new(props(&[("location", "X")]));
        let json = serde_json::to_string(&feature).unwrap();
        assert_eq!(json, r#"{"properties":{"location":"X"}}"#);
    }
}
