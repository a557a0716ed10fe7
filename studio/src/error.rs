//! Crate-wide error taxonomy.
//!
//! Adapter failures carry their own [`AdapterError`] kind; everything else
//! maps onto the variants here. Agents catch adapter errors at their own
//! boundary and fold them into an `AgentResult { success: false, .. }`; a
//! `StudioError` escaping an agent means a bug (the orchestrator wraps it
//! into a generic error response rather than propagating to the transport).

use thiserror::Error;

use crate::adapters::AdapterError;

#[derive(Debug, Error)]
pub enum StudioError {
    /// Malformed URL, unrecognized command, missing required field.
    /// Reported to the user; the stage stays put.
    #[error("invalid input: {0}")]
    UserInput(String),

    /// LLM output could not be parsed into the expected structure.
    #[error("parse failed: {0}")]
    Parse(String),

    /// Missing file, exhausted quota across all providers, disk trouble.
    #[error("resource unavailable: {0}")]
    Resource(String),

    /// External backend failure, classified by the adapter.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Session persistence failure.
    #[error("session store: {0}")]
    Store(String),

    /// Internal bug; logged with context and surfaced generically.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<std::io::Error> for StudioError {
    fn from(e: std::io::Error) -> Self {
        StudioError::Resource(e.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        StudioError::Parse(e.to_string())
    }
}
