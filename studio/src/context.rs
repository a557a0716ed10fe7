//! Session context: a dynamic map of well-known keys to structured values.
//!
//! Values are `serde_json::Value` (string | number | bool | list | map |
//! base64 string); agents go through the typed getters and the key
//! constants below rather than raw string lookups.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StudioError;

/// Well-known context keys. The orchestrator's merge table writes these;
/// agents read them through [`SessionContext`].
pub mod keys {
    pub const USER_REQUEST: &str = "user_request";
    pub const CHANNEL_NAMES: &str = "channel_names";
    pub const SELECTED_CHANNEL_NAME: &str = "selected_channel_name";
    pub const BENCHMARK_REPORT: &str = "benchmark_report";
    pub const BENCHMARK_SHOWN: &str = "benchmark_shown";
    pub const CHARACTER_INFO: &str = "character_info";
    pub const CHARACTER_IMAGE: &str = "character_image";
    pub const VIDEO_IDEAS: &str = "video_ideas";
    pub const SELECTED_VIDEO_IDEA: &str = "selected_video_idea";
    pub const SCRIPT: &str = "script";
    pub const IMAGE_PROMPTS: &str = "image_prompts";
    pub const GENERATED_IMAGES: &str = "generated_images";
    pub const GENERATED_VIDEOS: &str = "generated_videos";
    pub const QC_RESULTS: &str = "qc_results";
    pub const VOICE_SECTIONS: &str = "voice_sections";
    pub const FINAL_VIDEO: &str = "final_video";
    pub const SUBTITLE_FILE: &str = "subtitle_file";
    pub const SESSION_ID: &str = "session_id";
    pub const TTS_VOICE_OPTION: &str = "tts_voice_option";
    pub const TTS_SPEAKER: &str = "tts_speaker";
    pub const TTS_CLONE_MODE: &str = "tts_clone_mode";
    pub const TTS_YOUTUBE_URL: &str = "tts_youtube_url";
    pub const TTS_YOUTUBE_TIME: &str = "tts_youtube_time";
    pub const TTS_SAMPLE_IDX: &str = "tts_sample_idx";
}

/// The session's context map. Insertion order is irrelevant.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SessionContext(pub Map<String, Value>);

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }

    pub fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }

    /// Required lookup for a key the current stage is entitled to assume.
    /// A miss is an invariant violation, not a user error.
    pub fn require(&self, key: &str) -> Result<&Value, StudioError> {
        self.get(key)
            .ok_or_else(|| StudioError::Invariant(format!("context key missing: {key}")))
    }

    pub fn require_str(&self, key: &str) -> Result<&str, StudioError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| StudioError::Invariant(format!("context key not a string: {key}")))
    }

    /// Merges `data` into the context, replacing existing keys.
    pub fn merge(&mut self, data: &Map<String, Value>) {
        for (k, v) in data {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// The per-scene prompt list stored under `image_prompts.prompts`.
    pub fn image_prompt_list(&self) -> Vec<Value> {
        self.get_object(keys::IMAGE_PROMPTS)
            .and_then(|m| m.get("prompts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_getters_read_values() {
        let mut ctx = SessionContext::new();
        ctx.set(keys::SELECTED_CHANNEL_NAME, json!("투자연구소"));
        ctx.set(keys::CHANNEL_NAMES, json!(["A", "B"]));
        assert_eq!(ctx.get_str(keys::SELECTED_CHANNEL_NAME), Some("투자연구소"));
        assert_eq!(ctx.get_array(keys::CHANNEL_NAMES).unwrap().len(), 2);
    }

    #[test]
    fn require_raises_on_unknown_key() {
        let ctx = SessionContext::new();
        assert!(matches!(
            ctx.require("nope"),
            Err(StudioError::Invariant(_))
        ));
    }

    #[test]
    fn merge_replaces_existing_keys() {
        let mut ctx = SessionContext::new();
        ctx.set("a", json!(1));
        let mut data = Map::new();
        data.insert("a".into(), json!(2));
        data.insert("b".into(), json!(3));
        ctx.merge(&data);
        assert_eq!(ctx.get_u64("a"), Some(2));
        assert_eq!(ctx.get_u64("b"), Some(3));
    }

    #[test]
    fn image_prompt_list_reads_nested_prompts() {
        let mut ctx = SessionContext::new();
        ctx.set(keys::IMAGE_PROMPTS, json!({"prompts": [{"line_num": 1}]}));
        assert_eq!(ctx.image_prompt_list().len(), 1);
    }
}
