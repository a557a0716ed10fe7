//! The workflow stages, in strict order. A session's stage only moves
//! forward; the documented reset points clear context keys, never the
//! stage itself.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ChannelName,
    Benchmarking,
    Character,
    TtsSettings,
    VideoIdeas,
    Script,
    ImagePrompt,
    ImageGenerate,
    Voiceover,
    Compose,
    Completed,
}

impl Stage {
    pub const ORDER: [Stage; 11] = [
        Stage::ChannelName,
        Stage::Benchmarking,
        Stage::Character,
        Stage::TtsSettings,
        Stage::VideoIdeas,
        Stage::Script,
        Stage::ImagePrompt,
        Stage::ImageGenerate,
        Stage::Voiceover,
        Stage::Compose,
        Stage::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ChannelName => "channel_name",
            Stage::Benchmarking => "benchmarking",
            Stage::Character => "character",
            Stage::TtsSettings => "tts_settings",
            Stage::VideoIdeas => "video_ideas",
            Stage::Script => "script",
            Stage::ImagePrompt => "image_prompt",
            Stage::ImageGenerate => "image_generate",
            Stage::Voiceover => "voiceover",
            Stage::Compose => "compose",
            Stage::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        Stage::ORDER.iter().copied().find(|stage| stage.as_str() == s)
    }

    /// The following stage; `None` past the end.
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::ORDER.iter().position(|s| s == self)?;
        Stage::ORDER.get(idx + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ends_at_completed() {
        assert_eq!(Stage::Compose.next(), Some(Stage::Completed));
        assert_eq!(Stage::Completed.next(), None);
    }

    #[test]
    fn parse_roundtrips_every_stage() {
        for stage in Stage::ORDER {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::parse("bogus"), None);
    }

    #[test]
    fn serde_uses_snake_case_strings() {
        let json = serde_json::to_string(&Stage::ImageGenerate).unwrap();
        assert_eq!(json, "\"image_generate\"");
    }
}
