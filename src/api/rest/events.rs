//! Ingest endpoint for proxies reporting over HTTP

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::ApiError;
use crate::api::state::AppState;
use crate::ingest::RequestUsage;

/// POST /api/usage/events
///
/// Accepts the usage of one completed request. The write is fire-and-forget,
/// so the response only says whether statistics are enabled. Negative token
/// counts are rejected with 400.
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Json(usage): Json<RequestUsage>,
) -> Response {
    if let Err(e) = state.recorder.record(usage) {
        return (StatusCode::BAD_REQUEST, Json(ApiError::bad_request(e.to_string())))
            .into_response();
    }

    let recorded = state.recorder.is_enabled();
    (StatusCode::ACCEPTED, Json(json!({ "recorded": recorded }))).into_response()
}
