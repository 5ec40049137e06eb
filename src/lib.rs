//! Usage Ledger
//!
//! Per-request usage telemetry for an API proxy: a buffered, crash-tolerant
//! JSON Lines store and the aggregation behind the usage dashboard.
//!
//! # Features
//!
//! - **Buffered writes**: memory append under one lock, flushed at 50 events
//! - **Bounded staleness**: background flush every 30 seconds
//! - **Tolerant replay**: malformed log lines are skipped, not fatal
//! - **Dashboard metrics**: totals, per-model breakdown, hourly time series
//!
//! # Modules
//!
//! - `types`: Persisted `UsageEvent` and metrics response shapes
//! - `event_store`: `UsageStore` and its periodic flush
//! - `aggregation`: Pure windowed aggregation
//! - `ingest`: `UsageRecorder` and credential hashing
//! - `api`: Axum router, query validation and handlers
//! - `config`: Environment-driven configuration
//! - `logging`: `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use usage_ledger::{aggregate, UsageEvent, UsageStore, UsageStoreConfig};
//!
//! let store = UsageStore::with_manual_flush(UsageStoreConfig::new("usage.jsonl"));
//! store.write(UsageEvent::new(Utc::now(), "gpt-4", 300)).unwrap();
//! store.flush().unwrap();
//!
//! let events = store.load().unwrap();
//! let now = Utc::now();
//! let metrics = aggregate(&events, now - chrono::Duration::hours(24), now, None);
//! println!("{} tokens", metrics.totals.tokens);
//! ```

pub mod aggregation;
pub mod api;
pub mod config;
pub mod event_store;
pub mod ingest;
pub mod logging;
pub mod types;

// Re-export commonly used items at crate root
pub use aggregation::aggregate;
pub use config::ServiceConfig;
pub use event_store::{UsageStore, UsageStoreConfig, UsageStoreError, UsageStoreResult};
pub use ingest::{KeyHasher, RecordError, RequestUsage, Sha256KeyHasher, UsageRecorder};
pub use types::{MetricsResponse, MetricsTotals, ModelMetrics, TimeseriesBucket, UsageEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
