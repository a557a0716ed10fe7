//! TTS adapter: preset-speaker synthesis and reference-audio cloning.
//!
//! Two endpoints: the preset server takes a speaker name, the cloning
//! server takes base64 reference audio plus optional reference text (no
//! text switches the server to x-vector-only mode). Both return base64
//! audio which is decoded here.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};

use super::AdapterError;

/// Speech synthesis surface used by the voiceover agent.
#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Synthesizes with a named preset speaker. Returns raw audio bytes.
    async fn synthesize_preset(
        &self,
        text: &str,
        speaker: &str,
        language: &str,
    ) -> Result<Vec<u8>, AdapterError>;

    /// Synthesizes by cloning the voice in `ref_audio_b64`. `ref_text` is
    /// the transcript of the reference segment when available.
    async fn synthesize_clone(
        &self,
        text: &str,
        ref_audio_b64: &str,
        ref_text: Option<&str>,
    ) -> Result<Vec<u8>, AdapterError>;
}

pub struct HttpTts {
    preset_url: String,
    clone_url: String,
    client: reqwest::Client,
}

impl HttpTts {
    pub fn new(preset_url: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            preset_url: preset_url.into(),
            clone_url: clone_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post_for_audio(
        &self,
        url: String,
        payload: Value,
        timeout: Duration,
    ) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let data: Value = response.json().await?;
        let b64 = data
            .get("audio_base64")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::parse("TTS response missing audio_base64"))?;
        base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| AdapterError::parse(format!("TTS audio not base64: {e}")))
    }
}

#[async_trait]
impl TtsClient for HttpTts {
    async fn synthesize_preset(
        &self,
        text: &str,
        speaker: &str,
        language: &str,
    ) -> Result<Vec<u8>, AdapterError> {
        self.post_for_audio(
            format!("{}/tts", self.preset_url),
            json!({
                "text": text,
                "language": language,
                "speaker": speaker,
                "instruct": "",
            }),
            Duration::from_secs(120),
        )
        .await
    }

    async fn synthesize_clone(
        &self,
        text: &str,
        ref_audio_b64: &str,
        ref_text: Option<&str>,
    ) -> Result<Vec<u8>, AdapterError> {
        self.post_for_audio(
            format!("{}/clone", self.clone_url),
            json!({
                "text": text,
                "language": "Korean",
                "ref_audio_base64": ref_audio_b64,
                "ref_text": ref_text.unwrap_or(""),
                "x_vector_only_mode": ref_text.is_none(),
            }),
            Duration::from_secs(180),
        )
        .await
    }
}
