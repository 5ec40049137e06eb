//! Usage event types
//!
//! A `UsageEvent` is the persisted unit of the usage log: one immutable
//! record per completed proxy request. Events are written as JSON Lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed API request's usage facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Event time of the request (normalised to UTC).
    ///
    /// Required: a line without it has no place in any window or hour
    /// bucket, so it is rejected and skipped on load rather than kept with
    /// a zero time.
    pub timestamp: DateTime<Utc>,
    /// Model identifier; empty is its own group
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    /// Supplied by the caller, never re-derived from prompt + completion
    #[serde(default)]
    pub total_tokens: i64,
    /// Result code of the request
    #[serde(default)]
    pub status: i32,
    /// Opaque correlation id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    /// Digest of the caller's credential, empty when unauthenticated
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key_hash: String,
}

impl UsageEvent {
    /// Create an event with the given model and token total at `timestamp`
    pub fn new(timestamp: DateTime<Utc>, model: impl Into<String>, total_tokens: i64) -> Self {
        Self {
            timestamp,
            model: model.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens,
            status: 200,
            request_id: String::new(),
            api_key_hash: String::new(),
        }
    }

    /// Set the prompt/completion split
    pub fn with_split(mut self, prompt_tokens: i64, completion_tokens: i64) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }

    /// Set the status code
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    /// Set the correlation id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Set the credential digest
    pub fn with_api_key_hash(mut self, api_key_hash: impl Into<String>) -> Self {
        self.api_key_hash = api_key_hash.into();
        self
    }

    /// Serialize to a single JSON line (without the trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a single JSON line, trailing newline allowed
    pub fn from_json_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }
}
