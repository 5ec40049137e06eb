//! REST API module for HTTP endpoints
//!
//! Provides the usage endpoints consumed by the dashboard and the proxy:
//! - `GET /api/usage/health` - Liveness of the metrics API
//! - `GET /api/usage/metrics` - Windowed, filtered usage aggregates
//! - `POST /api/usage/events` - Record one completed request

pub mod events;
pub mod metrics;

use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "BAD_REQUEST".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "INTERNAL_ERROR".to_string(),
        }
    }
}
