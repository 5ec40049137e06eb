//! Data types for the usage ledger
//!
//! This module contains the persisted event record and the shapes
//! returned by the metrics query.

mod event;
mod metrics;

pub use event::UsageEvent;
pub use metrics::{MetricsResponse, MetricsTotals, ModelMetrics, TimeseriesBucket};
