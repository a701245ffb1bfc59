//! Forward-geocoding adapter.
//!
//! Looks up the single best match for a free-text place query and accepts
//! it only above a relevance threshold. Lookups happen once per key and
//! only for keys that are not already in the persisted dataset; geometry
//! is never refreshed for records that already have it.

use serde::Deserialize;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};
use url::Url;

use crate::feature::{FeatureMap, Geometry, PropertyValue};
use crate::key;
use crate::metrics_defs;

/// Default acceptance threshold for a match's self-reported relevance.
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.75;

/// Minimum pause between consecutive lookups, per the service rate limit.
pub const DEFAULT_CALL_DELAY: Duration = Duration::from_millis(100);

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    features: Vec<GeocodeFeature>,
}

#[derive(Deserialize)]
struct GeocodeFeature {
    #[serde(default)]
    relevance: f64,
    geometry: Geometry,
    #[serde(default)]
    place_name: Option<String>,
}

/// An accepted geocoding result.
pub struct GeocodeMatch {
    pub geometry: Geometry,
    pub place_name: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid geocoder URL: {0}")]
    InvalidUrl(String),

    #[error("geocoder returned status {0}")]
    Status(reqwest::StatusCode),
}

pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
    token: String,
    countries: Vec<String>,
    place_types: Vec<String>,
    relevance_threshold: f64,
    call_delay: Duration,
}

impl Geocoder {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        countries: Vec<String>,
        place_types: Vec<String>,
    ) -> Self {
        Geocoder {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            countries,
            place_types,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            call_delay: DEFAULT_CALL_DELAY,
        }
    }

    pub fn with_relevance_threshold(mut self, threshold: f64) -> Self {
        self.relevance_threshold = threshold;
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Resolves the single best match for a query, or `None` when the
    /// service has no match or the match falls below the relevance
    /// threshold.
    pub async fn forward(&self, query: &str) -> Result<Option<GeocodeMatch>, GeocodeError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| GeocodeError::InvalidUrl(err.to_string()))?;
        let document = format!("{query}.json");
        url.path_segments_mut()
            .map_err(|()| GeocodeError::InvalidUrl(self.base_url.clone()))?
            .extend(["geocoding", "v5", "mapbox.places"])
            .push(&document);
        url.query_pairs_mut()
            .append_pair("access_token", &self.token)
            .append_pair("limit", "1")
            .append_pair("country", &self.countries.join(","))
            .append_pair("types", &self.place_types.join(","));

        crate::counter!(metrics_defs::GEOCODE_LOOKUPS).increment(1);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status()));
        }

        let body = response.json::<GeocodeResponse>().await?;
        let Some(feature) = body.features.into_iter().next() else {
            return Ok(None);
        };

        debug!(%query, relevance = feature.relevance, "geocode match");
        if feature.relevance < self.relevance_threshold {
            warn!(%query, relevance = feature.relevance, "geocode match below threshold");
            return Ok(None);
        }

        Ok(Some(GeocodeMatch {
            geometry: feature.geometry,
            place_name: feature.place_name,
        }))
    }

    /// Geocodes the given sheet keys sequentially, pausing between calls.
    ///
    /// Keys that fail to resolve, for any reason, are removed from the
    /// sheet with a warning; the key is not retried within the run and the
    /// batch continues.
    pub async fn resolve_missing(&self, sheet: &mut FeatureMap, keys: &[String]) {
        for (index, sheet_key) in keys.iter().enumerate() {
            if index > 0 {
                sleep(self.call_delay).await;
            }

            let query = key::location_part(sheet_key).to_string();
            let resolved = match self.forward(&query).await {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!(key = %sheet_key, error = %err, "error geocoding; dropping");
                    sheet.shift_remove(sheet_key);
                    crate::counter!(metrics_defs::GEOCODE_DROPPED).increment(1);
                    continue;
                }
            };

            let Some(hit) = resolved else {
                warn!(key = %sheet_key, "no acceptable geocode match; dropping");
                sheet.shift_remove(sheet_key);
                crate::counter!(metrics_defs::GEOCODE_DROPPED).increment(1);
                continue;
            };

            if let Some(feature) = sheet.get_mut(sheet_key) {
                feature.geometry = Some(hit.geometry);
                if let Some(place_name) = hit.place_name {
                    feature.properties.insert(
                        "placeName".to_string(),
                        PropertyValue::Text(friendly_place_name(&place_name, &query)),
                    );
                }
            }
        }
    }
}

/// Human-friendly place name: the service echoes the query and appends
/// `", United States"` for US results; both are stripped.
fn friendly_place_name(place_name: &str, query: &str) -> String {
    place_name
        .replace(&format!("{query}, "), "")
        .replace(", United States", "")
}
