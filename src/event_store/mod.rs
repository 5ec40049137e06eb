//! Event Store Module for usage telemetry
//!
//! This module provides the durable side of usage tracking:
//! - `UsageStore`: Buffers events in memory and appends them to a JSON Lines log
//! - `FlushScheduler`: Background task bounding how stale the log can get
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌──────────┐    ┌──────────────┐    ┌─────────────────────┐    ┌─────────────┐
//! │ Recorder │───►│ write() into │───►│ flush at threshold, │───►│ append to   │
//! │          │    │ buffer       │    │ tick, or close()    │    │ usage.jsonl │
//! └──────────┘    └──────────────┘    └─────────────────────┘    └─────────────┘
//!
//! Read Path (Query):
//! ┌───────────────┐    ┌─────────────────┐
//! │ load() whole  │───►│ aggregate()     │───► Metrics
//! │ usage.jsonl   │    │ window + model  │
//! └───────────────┘    └─────────────────┘
//! ```

mod scheduler;
mod store;

pub use store::{
    FlushStage, UsageStore, UsageStoreConfig, UsageStoreError, UsageStoreResult,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_FLUSH_THRESHOLD,
};
