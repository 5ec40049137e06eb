//! Shared application state for the HTTP handlers

use std::sync::Arc;

use crate::event_store::UsageStore;
use crate::ingest::UsageRecorder;

/// Dependencies injected into every handler
pub struct AppState {
    /// The usage store; `None` when statistics are disabled
    pub store: Option<Arc<UsageStore>>,

    /// Write path used by the ingest endpoint
    pub recorder: UsageRecorder,
}

impl AppState {
    pub fn new(store: Option<Arc<UsageStore>>, recorder: UsageRecorder) -> Self {
        Self { store, recorder }
    }
}
