//! Vision adapter: OpenAI-compatible multimodal chat against the vision
//! model, plus the typed analyses built on top of it (art style detection,
//! character description, strict quality check).

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::AdapterError;
use crate::json_extract::extract_object;
use crate::message::strip_data_url;

/// Recognized art styles for reference images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtStyle {
    Cartoon,
    Anime,
    Realistic,
    ThreeD,
    Illustration,
    Pixel,
}

impl ArtStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtStyle::Cartoon => "cartoon",
            ArtStyle::Anime => "anime",
            ArtStyle::Realistic => "realistic",
            ArtStyle::ThreeD => "3d",
            ArtStyle::Illustration => "illustration",
            ArtStyle::Pixel => "pixel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cartoon" => Some(ArtStyle::Cartoon),
            "anime" => Some(ArtStyle::Anime),
            "realistic" => Some(ArtStyle::Realistic),
            "3d" => Some(ArtStyle::ThreeD),
            "illustration" => Some(ArtStyle::Illustration),
            "pixel" => Some(ArtStyle::Pixel),
            _ => None,
        }
    }

    /// Prompt keywords describing each style, used when building generation
    /// prompts from a detected style.
    pub fn keywords(&self) -> &'static str {
        match self {
            ArtStyle::Cartoon => {
                "cartoon, animated, flat colors, bold outlines, american cartoon"
            }
            ArtStyle::Anime => "anime, manga, japanese animation, cel shaded, large eyes",
            ArtStyle::Realistic => {
                "realistic, photorealistic, detailed skin, natural lighting"
            }
            ArtStyle::ThreeD => "3d render, 3d model, cgi, pixar style, rendered",
            ArtStyle::Illustration => "illustration, digital art, concept art, painted",
            ArtStyle::Pixel => "pixel art, 8bit, 16bit, retro game style",
        }
    }
}

/// PASS/FAIL verdict of a strict consistency check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

/// Result of a vision quality check: 1-10 score plus verdict.
#[derive(Clone, Debug)]
pub struct QualityVerdict {
    pub score: f64,
    pub verdict: Verdict,
}

/// Vision surface used by the character, benchmark and QC paths.
#[async_trait]
pub trait Vision: Send + Sync {
    /// Free-form analysis of one image.
    async fn analyze_image(&self, image_b64: &str, prompt: &str) -> Result<String, AdapterError>;

    /// Classifies the art style of a reference image.
    async fn analyze_style(&self, image_b64: &str) -> Result<ArtStyle, AdapterError>;

    /// Describes a character image as a structured map (character_type,
    /// gender, clothing, expression, art_style, personality_vibe).
    async fn describe_character(
        &self,
        image_b64: &str,
    ) -> Result<Map<String, Value>, AdapterError>;

    /// Strict identity-consistency check: reference plus sampled frames.
    async fn quality_check(
        &self,
        reference_b64: &str,
        frames_b64: &[String],
        strict: bool,
    ) -> Result<QualityVerdict, AdapterError>;
}

const STYLE_PROMPT: &str = "Classify the art style of this image as exactly one of: \
cartoon, anime, realistic, 3d, illustration, pixel. \
Respond with JSON: {\"style\": \"<one of the six>\"}";

const CHARACTER_PROMPT: &str = "Describe the character in this image for reuse in image \
generation. Respond with JSON: {\"character_type\": \"human|animal|fantasy\", \
\"gender\": \"male|female|none\", \"clothing\": \"...\", \"expression\": \"...\", \
\"art_style\": \"...\", \"personality_vibe\": \"...\"}";

fn consistency_prompt(frame_count: usize, strict: bool) -> String {
    let strictness = if strict {
        "Be strict: any drift in face shape, hair, outfit colors or proportions is a FAIL."
    } else {
        "Minor rendering differences are acceptable."
    };
    format!(
        "The first image is the reference character. The following {frame_count} images are \
frames from a generated video. Judge whether the frames depict the SAME character as the \
reference. {strictness} Respond with JSON: {{\"score\": <1-10>, \"verdict\": \"PASS\"|\"FAIL\"}}"
    )
}

/// OpenAI-compatible multimodal chat client.
pub struct HttpVision {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpVision {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    fn image_part(image_b64: &str) -> Value {
        let url = if image_b64.starts_with("data:") {
            image_b64.to_string()
        } else {
            format!("data:image/png;base64,{image_b64}")
        };
        json!({"type": "image_url", "image_url": {"url": url}})
    }

    async fn multimodal_chat(
        &self,
        images: &[&str],
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AdapterError> {
        let mut content: Vec<Value> = images.iter().map(|i| Self::image_part(i)).collect();
        content.push(json!({"type": "text", "text": prompt}));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(std::time::Duration::from_secs(120))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": content}],
                "max_tokens": max_tokens,
                "temperature": 0.7,
            }))
            .send()
            .await?
            .error_for_status()?;

        let data: Value = response.json().await?;
        data.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::parse("vision response missing content"))
    }
}

#[async_trait]
impl Vision for HttpVision {
    async fn analyze_image(&self, image_b64: &str, prompt: &str) -> Result<String, AdapterError> {
        self.multimodal_chat(&[image_b64], prompt, 1024).await
    }

    async fn analyze_style(&self, image_b64: &str) -> Result<ArtStyle, AdapterError> {
        let answer = self.multimodal_chat(&[image_b64], STYLE_PROMPT, 256).await?;
        let style = extract_object(&answer)
            .and_then(|m| m.get("style").and_then(Value::as_str).map(str::to_string))
            .and_then(|s| ArtStyle::parse(&s));
        debug!(?style, "style analysis");
        // Unrecognized answers fall back to cartoon, the pipeline's default look.
        Ok(style.unwrap_or(ArtStyle::Cartoon))
    }

    async fn describe_character(
        &self,
        image_b64: &str,
    ) -> Result<Map<String, Value>, AdapterError> {
        let answer = self
            .multimodal_chat(&[image_b64], CHARACTER_PROMPT, 1024)
            .await?;
        extract_object(&answer)
            .ok_or_else(|| AdapterError::parse("character description did not contain JSON"))
    }

    async fn quality_check(
        &self,
        reference_b64: &str,
        frames_b64: &[String],
        strict: bool,
    ) -> Result<QualityVerdict, AdapterError> {
        let mut images: Vec<&str> = vec![strip_data_url(reference_b64)];
        images.extend(frames_b64.iter().map(|f| strip_data_url(f)));
        let prompt = consistency_prompt(frames_b64.len(), strict);
        let answer = self.multimodal_chat(&images, &prompt, 512).await?;

        let map = extract_object(&answer)
            .ok_or_else(|| AdapterError::parse("quality check did not contain JSON"))?;
        let score = map.get("score").and_then(Value::as_f64).unwrap_or(0.0);
        let verdict = match map.get("verdict").and_then(Value::as_str) {
            Some(v) if v.eq_ignore_ascii_case("pass") => Verdict::Pass,
            _ => Verdict::Fail,
        };
        Ok(QualityVerdict { score, verdict })
    }
}
