//! API module for HTTP endpoints
//!
//! This module exposes the usage metrics and ingest endpoints.

pub mod http;
pub mod query;
pub mod rest;
pub mod state;

pub use http::create_router;
pub use query::{MetricsParams, MetricsQuery, QueryError};
pub use state::AppState;
