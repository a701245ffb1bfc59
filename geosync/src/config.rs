use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use pipeline::run::JobSpec;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("No jobs configured")]
    NoJobs,

    #[error("Duplicate job name: {0}")]
    DuplicateJob(String),

    #[error("Job {0} uses a campaign source but no campaign API is configured")]
    MissingCampaignConfig(String),

    #[error("Geocoder country list cannot be empty")]
    EmptyCountries,

    #[error("Relevance threshold {0} is outside (0, 1]")]
    InvalidRelevanceThreshold(f64),

    #[error("Monitor service name cannot be empty")]
    EmptyServiceName,
}

/// Top-level configuration, parsed from a YAML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    pub storage: StorageConfig,
    pub spreadsheet: SpreadsheetConfig,
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub campaign: Option<CampaignConfig>,
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub monitor: Option<MonitorConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jobs.is_empty() {
            return Err(ValidationError::NoJobs);
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if !names.insert(&job.name) {
                return Err(ValidationError::DuplicateJob(job.name.clone()));
            }
            if job.campaign.is_some() && self.campaign.is_none() {
                return Err(ValidationError::MissingCampaignConfig(job.name.clone()));
            }
        }

        self.geocoder.validate()?;
        if let Some(monitor) = &self.monitor {
            if monitor.service_name.is_empty() {
                return Err(ValidationError::EmptyServiceName);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

/// Where published datasets live.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StorageConfig {
    /// Local directory, for development and dry runs.
    Filesystem { base_dir: String },
    /// HTTP object storage: public reads, authenticated uploads.
    Http {
        public_base_url: String,
        upload_base_url: String,
        /// Environment variable holding the upload token, if uploads need
        /// one.
        #[serde(default)]
        token_env: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct SpreadsheetConfig {
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

#[derive(Debug, Deserialize)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub token_env: String,
    pub countries: Vec<String>,
    pub types: Vec<String>,
    #[serde(default)]
    pub relevance_threshold: Option<f64>,
    #[serde(default)]
    pub call_delay_ms: Option<u64>,
}

impl GeocoderConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.countries.is_empty() {
            return Err(ValidationError::EmptyCountries);
        }
        if let Some(threshold) = self.relevance_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(ValidationError::InvalidRelevanceThreshold(threshold));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CampaignConfig {
    pub base_url: String,
    pub token_env: String,
}

#[derive(Debug, Deserialize)]
pub struct MonitorConfig {
    pub service_name: String,
    pub topic_url: String,
}
