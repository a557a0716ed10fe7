//! OpenAI-compatible chat-completions provider.
//!
//! Groq, OpenRouter and the Gemini OpenAI endpoint all speak this shape, as
//! does a local vLLM server; one implementation covers the whole chain.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::ChatProvider;
use crate::adapters::{AdapterError, ChatOptions};
use crate::message::{ChatMessage, ChatRole};

pub struct OpenAiCompatProvider {
    name: String,
    priority: u8,
    is_local: bool,
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn remote(
        name: &str,
        priority: u8,
        base_url: &str,
        api_key: &str,
        model: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            priority,
            is_local: false,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: Some(api_key.to_string()),
            model: model.to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn local(name: &str, priority: u8, base_url: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            priority,
            is_local: true,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: model.to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    fn role_str(role: ChatRole) -> &'static str {
        match role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn is_local(&self) -> bool {
        self.is_local
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &ChatOptions,
    ) -> Result<String, AdapterError> {
        let mut full: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(ref system) = opts.system_prompt {
            full.push(json!({"role": "system", "content": system}));
        }
        for m in messages {
            full.push(json!({"role": Self::role_str(m.role), "content": m.content}));
        }

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(self.timeout)
            .json(&json!({
                "model": self.model,
                "messages": full,
                "temperature": opts.temperature,
                "max_tokens": opts.max_tokens,
            }));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let data: Value = response.json().await?;
        data.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AdapterError::parse(format!("{} response missing content", self.name))
            })
    }
}
