//! Metrics endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::error;

use super::ApiError;
use crate::api::query::MetricsParams;
use crate::api::state::AppState;
use crate::types::MetricsResponse;

/// GET /api/usage/health
pub async fn get_health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// GET /api/usage/metrics?from=2025-11-25T00:00:00Z&to=2025-11-26T00:00:00Z&model=gpt-4
///
/// Loads the whole usage log and aggregates it over the requested window.
/// Buffered events that have not been flushed yet are not included.
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricsParams>,
) -> Response {
    let query = match params.resolve(Utc::now()) {
        Ok(query) => query,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ApiError::bad_request(e.to_string())))
                .into_response()
        }
    };

    let Some(store) = state.store.clone() else {
        return Json(MetricsResponse::empty()).into_response();
    };

    let events = match tokio::task::spawn_blocking(move || store.load()).await {
        Ok(Ok(events)) => events,
        Ok(Err(e)) => {
            error!(error = %e, "failed to load usage events");
            return load_failed();
        }
        Err(e) => {
            error!(error = %e, "usage load task failed");
            return load_failed();
        }
    };

    Json(query.aggregate(&events)).into_response()
}

fn load_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::internal("failed to load usage events")),
    )
        .into_response()
}
