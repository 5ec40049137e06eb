//! Usage recorder - the request pipeline's entry point into the store
//!
//! Turns the facts of a finished request into a `UsageEvent` and hands it
//! to the store without making the request wait for it. Recording is
//! best-effort: store failures are logged, never returned to the request.
//! Writes still in flight are counted so shutdown can `drain` them before
//! the store's final flush.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::hasher::KeyHasher;
use crate::event_store::{UsageStore, UsageStoreError};
use crate::types::UsageEvent;

/// Why a request's usage was not recorded
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("'{0}' must not be negative")]
    NegativeTokens(&'static str),

    #[error(transparent)]
    Store(#[from] UsageStoreError),
}

/// Usage facts of one completed request, as the proxy knows them
#[derive(Clone, Default, Deserialize)]
pub struct RequestUsage {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub request_id: String,
    /// Raw credential; hashed before it reaches the store
    #[serde(default)]
    pub api_key: Option<String>,
}

impl RequestUsage {
    /// Token counts must be non-negative
    pub fn validate(&self) -> Result<(), RecordError> {
        let counts = [
            ("prompt_tokens", self.prompt_tokens),
            ("completion_tokens", self.completion_tokens),
            ("total_tokens", self.total_tokens),
        ];
        match counts.into_iter().find(|(_, value)| *value < 0) {
            Some((field, _)) => Err(RecordError::NegativeTokens(field)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RequestUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestUsage")
            .field("model", &self.model)
            .field("prompt_tokens", &self.prompt_tokens)
            .field("completion_tokens", &self.completion_tokens)
            .field("total_tokens", &self.total_tokens)
            .field("status", &self.status)
            .field("request_id", &self.request_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Count of background writes not yet finished
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(Arc::clone(self))
    }
}

/// Held by one background write; released when the task finishes or is dropped unrun
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Records request usage into an optional store.
///
/// A recorder without a store is the "statistics disabled" configuration:
/// valid calls are no-ops.
#[derive(Clone)]
pub struct UsageRecorder {
    store: Option<Arc<UsageStore>>,
    hasher: Arc<dyn KeyHasher>,
    in_flight: Arc<InFlight>,
}

impl UsageRecorder {
    pub fn new(store: Option<Arc<UsageStore>>, hasher: Arc<dyn KeyHasher>) -> Self {
        Self {
            store,
            hasher,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Recorder that drops everything
    pub fn disabled(hasher: Arc<dyn KeyHasher>) -> Self {
        Self::new(None, hasher)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Build the persisted record, hashing the credential
    pub fn build_event(&self, usage: RequestUsage, timestamp: DateTime<Utc>) -> UsageEvent {
        let api_key_hash = usage
            .api_key
            .as_deref()
            .map(|key| self.hasher.hash(key))
            .unwrap_or_default();

        UsageEvent {
            timestamp,
            model: usage.model,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            status: usage.status,
            request_id: usage.request_id,
            api_key_hash,
        }
    }

    /// Fire-and-forget: stamp the event now and write it on the blocking pool.
    ///
    /// Only invalid usage is returned as an error; store failures are logged.
    /// Outside a tokio runtime the write happens inline.
    pub fn record(&self, usage: RequestUsage) -> Result<(), RecordError> {
        usage.validate()?;
        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        let event = self.build_event(usage, Utc::now());

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let guard = self.in_flight.enter();
                handle.spawn_blocking(move || {
                    let _guard = guard;
                    write_logged(&store, event);
                });
            }
            Err(_) => write_logged(&store, event),
        }
        Ok(())
    }

    /// Stamp and write synchronously, returning the store's result
    pub fn record_blocking(&self, usage: RequestUsage) -> Result<(), RecordError> {
        usage.validate()?;
        match &self.store {
            Some(store) => Ok(store.write(self.build_event(usage, Utc::now()))?),
            None => Ok(()),
        }
    }

    /// Number of background writes that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Wait until every write handed off by `record` has reached the store.
    ///
    /// Call before `UsageStore::close` so accepted events make the final flush.
    pub async fn drain(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }
}

fn write_logged(store: &UsageStore, event: UsageEvent) {
    let model = event.model.clone();
    match store.write(event) {
        Ok(()) => debug!(model = %model, "usage event recorded"),
        Err(e) => warn!(model = %model, error = %e, "failed to record usage event"),
    }
}
