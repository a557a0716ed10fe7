//! Envelope (session_id, run_id, event_id) injected into each streamed event.
//!
//! `EnvelopeState` tracks the next event_id for one run and stamps every
//! outgoing JSON object. Existing keys are never overwritten.

use crate::event::ProgressEvent;
use serde_json::Value;

/// Envelope fields recommended for each streamed message.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Session ID; constant within a session.
    pub session_id: Option<String>,
    /// Run ID; constant from the incoming message to its terminal event.
    pub run_id: Option<String>,
    /// Per-message sequence number; monotonically increasing within a stream.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.session_id {
            obj.entry("session_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ref id) = self.run_id {
            obj.entry("run_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one run: session_id, run_id, next event_id.
pub struct EnvelopeState {
    pub session_id: String,
    pub run_id: String,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(session_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            run_id: run_id.into(),
            next_event_id: 1,
        }
    }

    /// Injects the envelope into the event value and advances the counter.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_session_id(&self.session_id)
            .with_run_id(&self.run_id)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }
}

/// Converts a progress event to JSON and injects the envelope.
/// Returns the final value (type + payload + session_id, run_id, event_id).
pub fn to_json(
    event: &ProgressEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_does_not_overwrite_existing_keys() {
        let mut v = serde_json::json!({"session_id": "keep", "type": "done"});
        Envelope::new()
            .with_session_id("other")
            .with_event_id(7)
            .inject_into(&mut v);
        assert_eq!(v["session_id"], "keep");
        assert_eq!(v["event_id"], 7);
    }

    #[test]
    fn event_ids_increase_monotonically() {
        let mut state = EnvelopeState::new("s1", "r1");
        let a = to_json(&ProgressEvent::Done, &mut state).unwrap();
        let b = to_json(&ProgressEvent::Done, &mut state).unwrap();
        assert_eq!(a["event_id"], 1);
        assert_eq!(b["event_id"], 2);
        assert_eq!(a["session_id"], "s1");
        assert_eq!(b["run_id"], "r1");
    }
}
