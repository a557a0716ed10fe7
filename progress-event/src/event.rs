//! Wire-level event types: one tagged object per streamed line.
//!
//! A run emits zero or more `progress` events, then exactly one `result`
//! followed by `done`, or a single `error`. Payload-carrying variants use
//! `serde_json::Value`; the bus serializes its own records into these.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One streamed event. Envelope fields (session_id, run_id, event_id) are
/// applied separately, after serialization.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Incremental progress: short status plus free-form detail.
    Progress {
        status: String,
        detail: String,
        /// ISO-8601 emission time, set by the bus.
        timestamp: String,
    },
    /// The run's final structured result (the orchestrator response).
    Result { data: Value },
    /// Terminal marker after `result`; the stream closes after this.
    Done,
    /// Terminal failure; carries the user-safe message.
    Error { message: String },
}

impl ProgressEvent {
    /// Serializes this event to a JSON object (type + payload only).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// True for `done` and `error`: the consumer should close its stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Done | ProgressEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_serializes_with_snake_case_tag() {
        let ev = ProgressEvent::Progress {
            status: "collecting".into(),
            detail: "videos 3/20".into(),
            timestamp: "2025-01-01T00:00:00Z".into(),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], "progress");
        assert_eq!(v["status"], "collecting");
        assert_eq!(v["detail"], "videos 3/20");
    }

    #[test]
    fn done_and_error_are_terminal() {
        assert!(ProgressEvent::Done.is_terminal());
        assert!(ProgressEvent::Error {
            message: "x".into()
        }
        .is_terminal());
        assert!(!ProgressEvent::Result {
            data: Value::Null
        }
        .is_terminal());
    }
}
