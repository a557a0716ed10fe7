//! The agent protocol and the stage agents.
//!
//! Every agent is a resumable feedback-driven state machine behind one
//! uniform contract: `execute` runs when the stage becomes active,
//! `handle_feedback` on every subsequent user message until the agent
//! completes (or the user skips). Results are structured, never thrown:
//! adapter failures are folded into `AgentResult { success: false }` at the
//! agent boundary.

pub mod benchmarker;
pub mod character;
pub mod composer;
pub mod image_generator;
pub mod image_prompter;
pub mod intent;
pub mod planner;
pub mod quality;
pub mod voiceover;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::SessionContext;
use crate::error::StudioError;

/// Lifecycle of one agent within its stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Running,
    WaitingFeedback,
    Completed,
    Error,
}

/// Structured result of every agent call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    /// Stable identifier of what produced this result, for client routing.
    pub step: String,
    /// User-facing text; may contain markdown.
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// True: the orchestrator must wait for the next user message instead
    /// of auto-advancing.
    pub needs_feedback: bool,
    /// Free-form payload merged into the session context under well-known
    /// keys and passed back to the client.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl AgentResult {
    pub fn ok(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            step: step.into(),
            message: message.into(),
            images: Vec::new(),
            needs_feedback: false,
            data: Map::new(),
        }
    }

    pub fn failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(step, message)
        }
    }

    /// Skip acknowledgment: `needs_feedback = false`, `data.skipped = true`;
    /// the orchestrator advances without merging stage output.
    pub fn skipped(step: impl Into<String>) -> Self {
        Self::ok(step, "이 단계를 건너뜁니다.").with_data("skipped", Value::Bool(true))
    }

    pub fn awaiting_feedback(mut self) -> Self {
        self.needs_feedback = true;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.data
            .get("skipped")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Uniform contract every stage agent satisfies.
#[async_trait]
pub trait Agent: Send {
    fn name(&self) -> &str;

    fn status(&self) -> AgentStatus;

    /// Called once when the agent's stage becomes active. `input` is the
    /// session context merged with stage-local overrides.
    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError>;

    /// Called for every subsequent user message until the agent completes.
    async fn handle_feedback(
        &mut self,
        feedback: &str,
        images: &[String],
    ) -> Result<AgentResult, StudioError>;
}
