//! Synchronizes event and affiliate records from spreadsheets and an
//! organizing API into geocoded GeoJSON datasets.
//!
//! A run builds a keyed sheet from its sources, geocodes keys the stored
//! dataset has not seen, merges the sheet into the dataset, and publishes
//! the result. Records keep their identity key across runs so geometry is
//! looked up at most once per key.

pub mod feature;
pub mod geocode;
pub mod key;
pub mod merge;
pub mod metrics_defs;
pub mod normalize;
pub mod publish;
pub mod run;
pub mod sources;
pub mod store;

pub use feature::{Feature, FeatureCollection, FeatureMap, Properties, PropertyValue};
pub use geocode::Geocoder;
pub use merge::OrphanPolicy;
pub use run::{JobSpec, Pipeline, SyncError};
pub use sources::{CampaignClient, SheetClient};
pub use store::{FeatureStore, FilesystemStore, HttpObjectStore};
