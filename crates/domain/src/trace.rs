use serde::Serialize;

use crate::user::Platform;

/// Structured trace events emitted across all chatbridge crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    UserCreated {
        user_key: String,
        user_id: String,
        platform: Platform,
    },
    HistoryReset {
        user_key: String,
        platform: Platform,
        reason: String,
    },
    HistoryTrimmed {
        user_key: String,
        removed: usize,
        remaining: usize,
        estimated_tokens: usize,
    },
    BackendRequest {
        backend: String,
        platform: Platform,
        streaming: bool,
        duration_ms: u64,
        total_tokens: Option<u32>,
        over_token_limit: bool,
    },
    MessageRejected {
        user_key: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cb_event");
    }
}
