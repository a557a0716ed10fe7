//! Typed records for channel analysis: collected metadata and the derived
//! benchmark report.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata of one analyzed video.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    /// Seconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub upload_date: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Metadata of one analyzed channel.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelMetadata {
    pub channel_id: String,
    pub channel_name: String,
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ThumbnailPattern {
    #[serde(default)]
    pub color_palette: Vec<String>,
    #[serde(default)]
    pub text_style: String,
    #[serde(default)]
    pub face_expression: String,
    #[serde(default)]
    pub layout_style: String,
    #[serde(default)]
    pub common_elements: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ScriptPattern {
    #[serde(default)]
    pub hook_style: String,
    #[serde(default)]
    pub structure: String,
    #[serde(default)]
    pub tone_and_voice: String,
    #[serde(default)]
    pub recurring_phrases: Vec<String>,
    #[serde(default)]
    pub cta_patterns: Vec<String>,
    /// Words.
    #[serde(default)]
    pub average_length: u64,
    #[serde(default)]
    pub summary: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentStrategy {
    #[serde(default)]
    pub content_pillars: Vec<String>,
    #[serde(default)]
    pub upload_frequency: String,
    #[serde(default)]
    pub video_length_pattern: String,
    #[serde(default)]
    pub trending_topics: Vec<String>,
    #[serde(default)]
    pub engagement_tactics: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AudienceProfile {
    #[serde(default)]
    pub demographics: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub content_preferences: String,
    #[serde(default)]
    pub summary: String,
}

/// The full derived report for a set of analyzed channels.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkReport {
    #[serde(default)]
    pub analyzed_channels: Vec<String>,
    #[serde(default)]
    pub analyzed_videos_count: u64,
    #[serde(default)]
    pub channel_concept: String,
    #[serde(default)]
    pub unique_selling_point: String,
    #[serde(default)]
    pub brand_voice: String,
    #[serde(default)]
    pub thumbnail_pattern: ThumbnailPattern,
    #[serde(default)]
    pub script_pattern: ScriptPattern,
    #[serde(default)]
    pub content_strategy: ContentStrategy,
    #[serde(default)]
    pub audience_profile: AudienceProfile,
    /// Six keyed sections: channel_setup, content_planning, thumbnail_guide,
    /// script_template, engagement_strategy, first_10_videos.
    #[serde(default)]
    pub replication_guide: Map<String, Value>,
}

impl BenchmarkReport {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
