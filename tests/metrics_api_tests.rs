//! Metrics API Integration Tests
//!
//! Drives the router end to end: events go in through the store or the
//! ingest endpoint and come back out as aggregated metrics.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use usage_ledger::api::{create_router, AppState};
use usage_ledger::event_store::{UsageStore, UsageStoreConfig};
use usage_ledger::ingest::{KeyHasher, Sha256KeyHasher, UsageRecorder};
use usage_ledger::types::{MetricsResponse, UsageEvent};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 25, h, m, 0).unwrap()
}

fn setup() -> (Router, Arc<UsageStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(UsageStore::with_manual_flush(UsageStoreConfig::new(
        dir.path().join("usage.jsonl"),
    )));
    let recorder = UsageRecorder::new(Some(Arc::clone(&store)), Arc::new(Sha256KeyHasher));
    let app = create_router(Arc::new(AppState::new(Some(Arc::clone(&store)), recorder)));
    (app, store, dir)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

const DAY: &str = "from=2025-11-25T00:00:00Z&to=2025-11-25T23:59:59Z";

#[tokio::test]
async fn test_metrics_totals_breakdown_and_series() {
    let (app, store, _dir) = setup();
    store.write(UsageEvent::new(at(10, 15), "A", 100)).unwrap();
    store.write(UsageEvent::new(at(10, 45), "B", 50)).unwrap();
    store.write(UsageEvent::new(at(13, 5), "A", 25)).unwrap();
    store.flush().unwrap();

    let (status, body) = get(&app, &format!("/api/usage/metrics?{}", DAY)).await;
    assert_eq!(status, StatusCode::OK);

    let metrics: MetricsResponse = serde_json::from_value(body).unwrap();
    assert_eq!(metrics.totals.tokens, 175);
    assert_eq!(metrics.totals.requests, 3);

    assert_eq!(metrics.by_model.len(), 2);
    assert_eq!(metrics.by_model[0].model, "A");
    assert_eq!(metrics.by_model[0].tokens, 125);
    assert_eq!(metrics.by_model[0].requests, 2);
    assert_eq!(metrics.by_model[1].model, "B");

    assert_eq!(metrics.timeseries.len(), 2);
    assert_eq!(metrics.timeseries[0].bucket_start, at(10, 0));
    assert_eq!(metrics.timeseries[0].tokens, 150);
    assert_eq!(metrics.timeseries[0].requests, 2);
    assert_eq!(metrics.timeseries[1].bucket_start, at(13, 0));
}

#[tokio::test]
async fn test_metrics_model_filter() {
    let (app, store, _dir) = setup();
    store.write(UsageEvent::new(at(10, 0), "A", 100)).unwrap();
    store.write(UsageEvent::new(at(11, 0), "B", 50)).unwrap();
    store.flush().unwrap();

    let (status, body) = get(&app, &format!("/api/usage/metrics?{}&model=B", DAY)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totals"], json!({ "tokens": 50, "requests": 1 }));
    assert_eq!(body["by_model"], json!([{ "model": "B", "tokens": 50, "requests": 1 }]));
}

#[tokio::test]
async fn test_metrics_bucket_start_is_rfc3339_utc() {
    let (app, store, _dir) = setup();
    store.write(UsageEvent::new(at(9, 30), "A", 1)).unwrap();
    store.flush().unwrap();

    let (_, body) = get(&app, &format!("/api/usage/metrics?{}", DAY)).await;

    assert_eq!(body["timeseries"][0]["bucket_start"], "2025-11-25T09:00:00Z");
}

#[tokio::test]
async fn test_metrics_default_window_is_last_day() {
    let (app, store, _dir) = setup();
    store.write(UsageEvent::new(Utc::now() - chrono::Duration::hours(1), "recent", 10)).unwrap();
    store.write(UsageEvent::new(Utc::now() - chrono::Duration::hours(30), "old", 10)).unwrap();
    store.flush().unwrap();

    let (status, body) = get(&app, "/api/usage/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totals"]["requests"], 1);
    assert_eq!(body["by_model"][0]["model"], "recent");
}

#[tokio::test]
async fn test_metrics_rejects_inverted_window() {
    let (app, _store, _dir) = setup();

    let (status, body) = get(
        &app,
        "/api/usage/metrics?from=2025-11-26T00:00:00Z&to=2025-11-25T00:00:00Z",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "'to' must be after 'from'");
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_metrics_rejects_bad_to() {
    let (app, _store, _dir) = setup();

    let (status, body) = get(&app, "/api/usage/metrics?to=tomorrow").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'to'"));
}

#[tokio::test]
async fn test_metrics_ignore_unflushed_events() {
    let (app, store, _dir) = setup();
    store.write(UsageEvent::new(at(10, 0), "A", 100)).unwrap();

    let (_, body) = get(&app, &format!("/api/usage/metrics?{}", DAY)).await;
    assert_eq!(body["totals"]["requests"], 0);

    store.flush().unwrap();
    let (_, body) = get(&app, &format!("/api/usage/metrics?{}", DAY)).await;
    assert_eq!(body["totals"]["requests"], 1);
}

#[tokio::test]
async fn test_ingest_endpoint_records_hashed_event() {
    let (app, store, dir) = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/api/usage/events")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "model": "gpt-4",
                "prompt_tokens": 100,
                "completion_tokens": 200,
                "total_tokens": 300,
                "status": 200,
                "request_id": "req-http-1",
                "api_key": "sk-live-abcdef"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The write happens off the request path
    for _ in 0..100 {
        if store.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    store.flush().unwrap();

    let events = store.load().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, "req-http-1");
    assert_eq!(events[0].total_tokens, 300);
    assert_eq!(events[0].api_key_hash, Sha256KeyHasher.hash("sk-live-abcdef"));

    let raw = std::fs::read_to_string(dir.path().join("usage.jsonl")).unwrap();
    assert!(!raw.contains("sk-live-abcdef"));

    let (_, body) = get(&app, "/api/usage/metrics?model=gpt-4").await;
    assert_eq!(body["totals"], json!({ "tokens": 300, "requests": 1 }));
}

#[tokio::test]
async fn test_ingest_when_disabled_is_accepted_but_not_recorded() {
    let recorder = UsageRecorder::disabled(Arc::new(Sha256KeyHasher));
    let app = create_router(Arc::new(AppState::new(None, recorder)));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/usage/events")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"model":"gpt-4","total_tokens":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "recorded": false }));
}

#[tokio::test]
async fn test_ingest_rejects_negative_token_counts() {
    let (app, store, _dir) = setup();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/usage/events")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"model":"A","total_tokens":-500}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "'total_tokens' must not be negative");
    assert_eq!(body["code"], "BAD_REQUEST");

    assert_eq!(store.len(), 0);
    store.flush().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_accepted_events_survive_shutdown() {
    let dir = TempDir::new().unwrap();
    let config = UsageStoreConfig::new(dir.path().join("usage.jsonl"))
        .with_flush_interval(Duration::from_secs(3600));
    let store = Arc::new(UsageStore::open(config));
    let recorder = UsageRecorder::new(Some(Arc::clone(&store)), Arc::new(Sha256KeyHasher));
    let app = create_router(Arc::new(AppState::new(
        Some(Arc::clone(&store)),
        recorder.clone(),
    )));

    for i in 0..10 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/usage/events")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "model": "gpt-4", "total_tokens": 1, "request_id": format!("r{}", i) })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    // Same order as the binary: drain the recorder, then close the store
    recorder.drain().await;
    store.close().await.unwrap();

    assert_eq!(store.load().unwrap().len(), 10);
}
