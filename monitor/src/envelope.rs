//! Decoding of log-subscription deliveries.
//!
//! The subscription hands over a base64-encoded, gzip-compressed JSON
//! envelope holding a batch of log events. Completed runs are identified by
//! `END` events whose extracted fields carry the run's request id.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid compressed payload: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate request id {0}")]
    DuplicateRequestId(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
    #[serde(rename = "extractedFields", default)]
    pub extracted_fields: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "logEvents")]
    pub log_events: Vec<LogEvent>,
}

/// The wrapper the subscription posts; `data` is the compressed envelope.
#[derive(Debug, Deserialize)]
pub struct SubscriptionPayload {
    pub data: String,
}

/// Decodes a base64 + gzip payload back to its original string.
pub fn decompress_payload(data: &str) -> Result<String, EnvelopeError> {
    let compressed = STANDARD.decode(data.as_bytes())?;
    let mut decoded = String::new();
    MultiGzDecoder::new(compressed.as_slice()).read_to_string(&mut decoded)?;
    Ok(decoded)
}

impl Envelope {
    /// Unpacks a delivered subscription payload into its log events.
    pub fn from_payload(payload: &SubscriptionPayload) -> Result<Self, EnvelopeError> {
        let raw = decompress_payload(&payload.data)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Request ids of the completed runs in this delivery, taken from `END`
    /// events. A run completes exactly once, so a duplicate id means the
    /// delivery itself is bad.
    pub fn request_ids(&self) -> Result<Vec<String>, EnvelopeError> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for event in &self.log_events {
            let fields = &event.extracted_fields;
            if fields.get("type").map(String::as_str) != Some("END") {
                continue;
            }
            let Some(id) = fields.get("requestId") else {
                continue;
            };
            if !seen.insert(id.clone()) {
                return Err(EnvelopeError::DuplicateRequestId(id.clone()));
            }
            ids.push(id.clone());
        }
        Ok(ids)
    }

    /// Events belonging to one run. Every event line carries its request
    /// id, so membership is a message match.
    pub fn events_for_request(&self, request_id: &str) -> Vec<&LogEvent> {
        self.log_events
            .iter()
            .filter(|event| event.message.contains(request_id))
            .collect()
    }
}
