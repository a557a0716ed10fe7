//! Opaque prompt templates for the LLM-backed stages.
//!
//! Templates are plain strings with `{name}` placeholders, loaded from an
//! optional TOML file (`STUDIO_PROMPTS_FILE`) over built-in defaults. The
//! rest of the system treats them as opaque.

use std::collections::HashMap;

use serde::Deserialize;

/// Substitutes `{name}` placeholders. Unknown placeholders stay verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub channel_name: String,
    pub video_ideas: String,
    pub script: String,
    pub scene_prompt_system: String,
    pub thumbnail_analysis: String,
    pub script_analysis: String,
    pub content_strategy: String,
    pub channel_concept: String,
    pub audience_profile: String,
    /// One template per replication-guide section, keyed by section name.
    pub replication_sections: HashMap<String, String>,
}

impl Default for PromptSet {
    fn default() -> Self {
        let mut replication_sections = HashMap::new();
        for (key, focus) in [
            ("channel_setup", "채널 개설: 채널명 규칙, 소개문, 배너/프로필 방향"),
            ("content_planning", "콘텐츠 기획: 주제 선정 기준, 시리즈 구성, 차별화 포인트"),
            ("thumbnail_guide", "썸네일 제작: 색상, 텍스트, 구도 가이드"),
            ("script_template", "대본 템플릿: 훅, 구조, 말투 가이드"),
            ("engagement_strategy", "참여 전략: 댓글/커뮤니티 운영, CTA 배치"),
            ("first_10_videos", "첫 10개 영상: 제목과 한 줄 기획 10개"),
        ] {
            replication_sections.insert(
                key.to_string(),
                format!(
                    "다음 벤치마크 분석을 바탕으로 유사 채널을 만들기 위한 가이드의 한 섹션을 작성해주세요.\n\n\
분석 요약:\n{{analysis}}\n\n섹션: {focus}\n\nJSON 객체 하나로만 답해주세요."
                ),
            );
        }

        Self {
            channel_name: "유튜브 채널명 5개를 추천해주세요.\n\n요청: {user_request}\n\n\
조건: 기억하기 쉽고, 주제가 드러나고, 한국어 기준 2~6글자.\n\n\
JSON으로만 답변: {\"channel_names\": [\"이름1\", \"이름2\", \"이름3\", \"이름4\", \"이름5\"], \"reasoning\": \"...\"}"
                .into(),
            video_ideas: "유튜브 영상 아이디어 5개를 만들어주세요.\n\n\
채널명: {channel_name}\n채널 컨셉: {channel_concept}\n추가 요청: {user_topic}\n\n\
JSON으로만 답변: {\"ideas\": [{\"title\": \"...\", \"hook\": \"...\", \"summary\": \"...\"}]}"
                .into(),
            script: "유튜브 영상 대본을 작성해주세요.\n\n영상 제목: {video_title}\n진행자: {character_name}\n\n\
섹션: opening(시청자를 붙잡는 15초), intro, body1, body2, body3, conclusion(구독 유도).\n\n\
JSON으로만 답변: {\"script\": {\"opening\": \"...\", \"intro\": \"...\", \"body1\": \"...\", \
\"body2\": \"...\", \"body3\": \"...\", \"conclusion\": \"...\"}, \"estimated_duration\": \"...\"}"
                .into(),
            scene_prompt_system: "너는 유튜브 영상 전문 AI 비주얼 스토리보드 엔지니어야.\n\n\
대본 한 줄을 받으면 이미지 프롬프트와 영상 프롬프트를 영어로 생성해.\n\n\
이미지 프롬프트 필수 요구사항:\n\
- 동일한 캐릭터의 전신 샷 (머리부터 발끝까지)\n- 스타일: {style}\n- 캐릭터 외모: {character_desc}\n\
- 의상: {clothing}\n- 배경: 흰색 또는 밝은 단색\n- 굵은 외곽선, 깔끔하고 평면적인 색\n\
- 대본 내용에 맞는 과장된 표정\n- 이미지 안에 텍스트 금지\n\n\
영상 프롬프트 규칙:\n- 미세하고 자연스러운 움직임만 (눈 깜빡임, 호흡, 작은 손동작)\n\
- 화면 흔들림/빠른 편집/캐릭터 잘림 금지\n- 길이 3-5초, 차분한 분위기\n\n\
응답 형식 (JSON): {\"image_prompt\": \"...\", \"video_prompt\": \"...\", \"expression\": \"...\", \"props\": [\"...\"]}"
                .into(),
            thumbnail_analysis: "Analyze these YouTube thumbnails from the same channel.\n\n\
Identify: color palette, text style, face/expression patterns, layout structure, common elements.\n\n\
Return JSON: {\"color_palette\": [\"...\"], \"text_style\": \"...\", \"face_expression\": \"...\", \
\"layout_style\": \"...\", \"common_elements\": [\"...\"], \"summary\": \"...\"}"
                .into(),
            script_analysis: "Analyze these video transcripts from the same YouTube channel.\n\n\
Channel: {channel_name}\n\nTranscripts:\n{transcripts}\n\n\
Identify hook style, structure, tone and voice, recurring phrases, CTA patterns.\n\n\
Return JSON: {\"hook_style\": \"...\", \"structure\": \"...\", \"tone_and_voice\": \"...\", \
\"recurring_phrases\": [\"...\"], \"cta_patterns\": [\"...\"], \"average_length\": 0, \"summary\": \"...\"}"
                .into(),
            content_strategy: "Analyze the content strategy of this YouTube channel.\n\n\
Channel: {channel_name}\nDescription: {channel_description}\n\n\
Video data (title, views, upload_date, duration):\n{video_data}\n\n\
Return JSON: {\"content_pillars\": [\"...\"], \"upload_frequency\": \"...\", \
\"video_length_pattern\": \"...\", \"trending_topics\": [\"...\"], \
\"engagement_tactics\": [\"...\"], \"summary\": \"...\"}"
                .into(),
            channel_concept: "Summarize this YouTube channel's concept from its top videos.\n\n\
Channel: {channel_name}\nTop videos:\n{video_titles}\n\n\
Return JSON: {\"channel_concept\": \"...\", \"unique_selling_point\": \"...\", \"brand_voice\": \"...\"}"
                .into(),
            audience_profile: "Profile the audience of this YouTube channel from its video titles.\n\n\
Channel: {channel_name}\nTitles:\n{video_titles}\n\n\
Return JSON: {\"demographics\": \"...\", \"interests\": [\"...\"], \"pain_points\": [\"...\"], \
\"content_preferences\": \"...\", \"summary\": \"...\"}"
                .into(),
            replication_sections,
        }
    }
}

impl PromptSet {
    /// Defaults overridden by an optional TOML file named in
    /// `STUDIO_PROMPTS_FILE`. Unreadable files fall back to the defaults.
    pub fn load() -> Self {
        let Some(path) = std::env::var_os("STUDIO_PROMPTS_FILE") else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "prompt file unreadable, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_known_placeholders() {
        let out = render("Hello {name}, {missing}", &[("name", "world")]);
        assert_eq!(out, "Hello world, {missing}");
    }

    #[test]
    fn defaults_have_all_replication_sections() {
        let prompts = PromptSet::default();
        for key in [
            "channel_setup",
            "content_planning",
            "thumbnail_guide",
            "script_template",
            "engagement_strategy",
            "first_10_videos",
        ] {
            assert!(prompts.replication_sections.contains_key(key), "{key}");
        }
    }
}
