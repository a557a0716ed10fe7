//! Thin typed async wrappers around external backends.
//!
//! One adapter per backend family; every failure surfaces as an
//! [`AdapterError`] with a kind the agents use to decide between retrying,
//! reprompting the user, and marking the stage errored.

mod download;
mod engine;
mod llm;
mod subprocess;
mod tts;
mod vision;

pub use download::HttpDownloader;
pub use engine::{HttpWorkflowEngine, JobStatus, WorkflowEngine};
pub use llm::{ChatOptions, Llm};
pub use subprocess::{CommandOutput, CommandRunner, ProcessRunner};
pub use tts::{HttpTts, TtsClient};
pub use vision::{ArtStyle, HttpVision, QualityVerdict, Verdict, Vision};

use thiserror::Error;

/// How an adapter failure should be treated upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterErrorKind {
    /// Timeout, network, rate limit, engine queue failure: worth retrying.
    Transient,
    /// Auth, invalid payload, model not loaded: retry will not help.
    Fatal,
    /// The call exceeded its deadline.
    Timeout,
    /// The backend answered but the response did not parse.
    Parse,
    /// Missing file, exhausted quota, no provider available.
    Resource,
}

#[derive(Clone, Debug, Error)]
#[error("{kind:?}: {detail}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub detail: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Transient, detail)
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Fatal, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Timeout, detail)
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Parse, detail)
    }

    pub fn resource(detail: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Resource, detail)
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdapterError::timeout(e.to_string())
        } else if e.is_status() {
            let fatal = e
                .status()
                .map(|s| s.is_client_error())
                .unwrap_or(false);
            if fatal {
                AdapterError::fatal(e.to_string())
            } else {
                AdapterError::transient(e.to_string())
            }
        } else {
            AdapterError::transient(e.to_string())
        }
    }
}
