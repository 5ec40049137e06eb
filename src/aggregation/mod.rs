//! Aggregation of usage events into dashboard metrics
//!
//! Pure functions over a slice of events: no I/O and no shared state, so a
//! query handler can run them on whatever `load` returned.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::types::{MetricsResponse, MetricsTotals, ModelMetrics, TimeseriesBucket, UsageEvent};

const SECONDS_PER_HOUR: i64 = 3600;

/// Aggregate events inside `[from, to]` (both ends inclusive).
///
/// `model_filter` is an exact, case-sensitive match; `None` or an empty
/// string keeps every model. The window is assumed well-formed
/// (`from <= to`); inverted windows are rejected at the query boundary.
///
/// Sums saturate at `i64::MAX` instead of overflowing.
///
/// `by_model` is sorted by tokens descending, ties keeping the order in
/// which models were first seen. `timeseries` has one bucket per UTC hour,
/// ascending.
pub fn aggregate(
    events: &[UsageEvent],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    model_filter: Option<&str>,
) -> MetricsResponse {
    let model_filter = model_filter.filter(|m| !m.is_empty());

    let mut totals = MetricsTotals::default();
    let mut by_model: Vec<ModelMetrics> = Vec::new();
    let mut model_index: HashMap<&str, usize> = HashMap::new();
    let mut hourly: BTreeMap<DateTime<Utc>, TimeseriesBucket> = BTreeMap::new();

    let passing = events
        .iter()
        .filter(|e| in_window(e, from, to) && matches_model(e, model_filter));

    for event in passing {
        totals.tokens = totals.tokens.saturating_add(event.total_tokens);
        totals.requests = totals.requests.saturating_add(1);

        let idx = *model_index.entry(event.model.as_str()).or_insert_with(|| {
            by_model.push(ModelMetrics {
                model: event.model.clone(),
                tokens: 0,
                requests: 0,
            });
            by_model.len() - 1
        });
        let model = &mut by_model[idx];
        model.tokens = model.tokens.saturating_add(event.total_tokens);
        model.requests = model.requests.saturating_add(1);

        let bucket_start = hour_start(event.timestamp);
        let bucket = hourly.entry(bucket_start).or_insert_with(|| TimeseriesBucket {
            bucket_start,
            tokens: 0,
            requests: 0,
        });
        bucket.tokens = bucket.tokens.saturating_add(event.total_tokens);
        bucket.requests = bucket.requests.saturating_add(1);
    }

    // sort_by is stable: equal totals keep discovery order
    by_model.sort_by(|a, b| b.tokens.cmp(&a.tokens));

    MetricsResponse {
        totals,
        by_model,
        timeseries: hourly.into_values().collect(),
    }
}

/// Floor a timestamp to the start of its UTC hour
pub fn hour_start(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let secs = timestamp.timestamp();
    let floored = secs - secs.rem_euclid(SECONDS_PER_HOUR);
    DateTime::from_timestamp(floored, 0).unwrap_or(timestamp)
}

fn in_window(event: &UsageEvent, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    event.timestamp >= from && event.timestamp <= to
}

fn matches_model(event: &UsageEvent, model_filter: Option<&str>) -> bool {
    model_filter.map_or(true, |m| event.model == m)
}
