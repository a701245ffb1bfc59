//! Durable feature-collection storage.
//!
//! The published dataset lives as one JSON document per logical dataset at
//! a well-known object path, publicly readable and refreshed on every run.
//! `HttpObjectStore` talks to the object storage service; the filesystem
//! store backs local runs and tests.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::feature::FeatureCollection;

/// How long a published document stays cacheable before the next run is
/// expected to have refreshed it.
const PUBLISH_MAX_AGE_SECS: u64 = 6 * 60 * 60;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned status {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed feature collection: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Loads the last published collection, or an empty one when the
    /// object does not exist yet.
    async fn fetch(&self, name: &str) -> Result<FeatureCollection, StoreError>;

    /// Writes the collection. Any failure is fatal for the run; nothing is
    /// considered published until this returns.
    async fn publish(&self, name: &str, collection: &FeatureCollection) -> Result<(), StoreError>;
}

pub struct HttpObjectStore {
    client: reqwest::Client,
    public_base_url: String,
    upload_base_url: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        public_base_url: impl Into<String>,
        upload_base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        HttpObjectStore {
            client: reqwest::Client::new(),
            public_base_url: public_base_url.into(),
            upload_base_url: upload_base_url.into(),
            token,
        }
    }

    fn object_url(base: &str, name: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), name)
    }
}

#[async_trait]
impl FeatureStore for HttpObjectStore {
    async fn fetch(&self, name: &str) -> Result<FeatureCollection, StoreError> {
        let url = Self::object_url(&self.public_base_url, name);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!(%url, "no existing dataset");
            return Ok(FeatureCollection::empty());
        }
        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status(),
                url,
            });
        }

        let collection = response.json::<FeatureCollection>().await?;
        info!(features = collection.features.len(), "loaded dataset");
        Ok(collection)
    }

    async fn publish(&self, name: &str, collection: &FeatureCollection) -> Result<(), StoreError> {
        let url = Self::object_url(&self.upload_base_url, name);
        let body = serde_json::to_vec_pretty(collection)?;

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::CACHE_CONTROL,
                format!("public, max-age={PUBLISH_MAX_AGE_SECS}"),
            )
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status(),
                url,
            });
        }

        info!(%url, features = collection.features.len(), "published dataset");
        Ok(())
    }
}

pub struct FilesystemStore {
    base_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FilesystemStore {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl FeatureStore for FilesystemStore {
    async fn fetch(&self, name: &str) -> Result<FeatureCollection, StoreError> {
        let path = self.base_dir.join(name);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no existing dataset");
                return Ok(FeatureCollection::empty());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn publish(&self, name: &str, collection: &FeatureCollection) -> Result<(), StoreError> {
        let path = self.base_dir.join(name);
        std::fs::write(&path, serde_json::to_vec_pretty(collection)?)?;
        info!(path = %path.display(), features = collection.features.len(), "published dataset");
        Ok(())
    }
}
