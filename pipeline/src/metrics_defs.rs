//! Metrics definitions for the pipeline.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

pub const SHEET_ROWS_READ: MetricDef = MetricDef {
    name: "sheet.rows_read",
    metric_type: MetricType::Counter,
    description: "Rows accepted from a spreadsheet source",
};

pub const SHEET_ROWS_SKIPPED: MetricDef = MetricDef {
    name: "sheet.rows_skipped",
    metric_type: MetricType::Counter,
    description: "Rows rejected for missing identity fields",
};

pub const CAMPAIGN_EVENTS_READ: MetricDef = MetricDef {
    name: "campaign.events_read",
    metric_type: MetricType::Counter,
    description: "Events accepted from the campaign API",
};

pub const GEOCODE_LOOKUPS: MetricDef = MetricDef {
    name: "geocode.lookups",
    metric_type: MetricType::Counter,
    description: "Forward-geocoding lookups issued",
};

pub const GEOCODE_DROPPED: MetricDef = MetricDef {
    name: "geocode.dropped",
    metric_type: MetricType::Counter,
    description: "Keys dropped for missing or low-relevance geocode results",
};

pub const MERGE_ORPHANS_REMOVED: MetricDef = MetricDef {
    name: "merge.orphans_removed",
    metric_type: MetricType::Counter,
    description: "Dataset entries removed as orphans during merge",
};

pub const DATASETS_PUBLISHED: MetricDef = MetricDef {
    name: "store.datasets_published",
    metric_type: MetricType::Counter,
    description: "Feature collections published",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SHEET_ROWS_READ,
    SHEET_ROWS_SKIPPED,
    CAMPAIGN_EVENTS_READ,
    GEOCODE_LOOKUPS,
    GEOCODE_DROPPED,
    MERGE_ORPHANS_REMOVED,
    DATASETS_PUBLISHED,
];
