//! Aggregated metrics response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated usage over a query window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub totals: MetricsTotals,
    /// Sorted by tokens, descending
    pub by_model: Vec<ModelMetrics>,
    /// Sorted by bucket start, ascending
    pub timeseries: Vec<TimeseriesBucket>,
}

/// Overall totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTotals {
    pub tokens: i64,
    pub requests: i64,
}

/// Totals for one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model: String,
    pub tokens: i64,
    pub requests: i64,
}

/// Totals for one UTC hour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeseriesBucket {
    pub bucket_start: DateTime<Utc>,
    pub tokens: i64,
    pub requests: i64,
}

impl MetricsResponse {
    /// Metrics with zero totals and empty lists
    pub fn empty() -> Self {
        Self::default()
    }
}
