//! Progress event protocol: type + payload + envelope.
//!
//! This crate defines the wire shape of one streamed progress event and the
//! envelope injection (session_id, run_id, event_id). It does not depend on
//! studio; studio's progress bus converts its records into `ProgressEvent`
//! and calls `to_json`.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProgressEvent;
