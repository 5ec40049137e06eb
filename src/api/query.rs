//! Metrics query parsing and validation
//!
//! Caller input is checked here so the aggregation engine only ever sees a
//! well-formed window.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::aggregation::aggregate;
use crate::types::{MetricsResponse, UsageEvent};

/// Window used when `from` is omitted
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Raw query string of `GET /api/usage/metrics`
#[derive(Debug, Default, Deserialize)]
pub struct MetricsParams {
    /// RFC3339 lower bound (default: now - 24h)
    pub from: Option<String>,
    /// RFC3339 upper bound (default: now)
    pub to: Option<String>,
    /// Exact model name
    pub model: Option<String>,
}

/// A validated metrics query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub model: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid 'from' timestamp format, expected RFC3339")]
    InvalidFrom,
    #[error("invalid 'to' timestamp format, expected RFC3339")]
    InvalidTo,
    #[error("'to' must be after 'from'")]
    InvertedRange,
}

impl MetricsParams {
    /// Resolve defaults against `now` and validate the window
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<MetricsQuery, QueryError> {
        let from = match non_empty(&self.from) {
            Some(raw) => parse_rfc3339(raw).ok_or(QueryError::InvalidFrom)?,
            None => now - Duration::hours(DEFAULT_LOOKBACK_HOURS),
        };

        let to = match non_empty(&self.to) {
            Some(raw) => parse_rfc3339(raw).ok_or(QueryError::InvalidTo)?,
            None => now,
        };

        if to < from {
            return Err(QueryError::InvertedRange);
        }

        Ok(MetricsQuery {
            from,
            to,
            model: non_empty(&self.model).map(str::to_string),
        })
    }
}

impl MetricsQuery {
    /// Run the aggregation engine over `events`
    pub fn aggregate(&self, events: &[UsageEvent]) -> MetricsResponse {
        aggregate(events, self.from, self.to, self.model.as_deref())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
