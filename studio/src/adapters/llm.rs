//! LLM adapter seam: the trait agents depend on.
//!
//! The production implementation is [`crate::providers::ProviderRouter`];
//! tests substitute a mock with scripted responses.

use async_trait::async_trait;

use super::AdapterError;
use crate::message::ChatMessage;

/// Sampling options for one chat call.
#[derive(Clone, Debug)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            system_prompt: None,
        }
    }
}

impl ChatOptions {
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn with_system_prompt(mut self, p: impl Into<String>) -> Self {
        self.system_prompt = Some(p.into());
        self
    }
}

/// Chat-completion surface used by every agent.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: ChatOptions,
    ) -> Result<String, AdapterError>;

    /// Single-prompt convenience: one user message.
    async fn generate(&self, prompt: &str, opts: ChatOptions) -> Result<String, AdapterError> {
        self.chat(&[ChatMessage::user(prompt)], opts).await
    }
}
