//! ImagePrompter agent: turns the script into per-scene image/video
//! prompts.
//!
//! The script is split into sentences (`.`/`!`/`?` followed by whitespace,
//! fragments under 6 characters dropped); each sentence gets one LLM call
//! that must return `{image_prompt, video_prompt, expression, props[]}`.
//! REVIEW supports per-scene modification (`N번 <instruction>`) and full
//! regeneration.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{intent, Agent, AgentResult, AgentStatus};
use crate::adapters::{ChatOptions, Llm};
use crate::context::{keys, SessionContext};
use crate::error::StudioError;
use crate::json_extract::extract_object;
use crate::progress::ProgressHandle;
use crate::prompts::{render, PromptSet};

/// Splits script text into scene-sized sentences.
pub fn split_script(script_text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = script_text.trim().chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let boundary = chars.peek().map(|n| n.is_whitespace()).unwrap_or(true);
            if boundary {
                let sentence = current.trim().to_string();
                if sentence.chars().count() > 5 {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }
    let tail = current.trim().to_string();
    if tail.chars().count() > 5 {
        sentences.push(tail);
    }
    sentences
}

/// Joins a structured script's sections into one text block.
fn script_to_text(script: &Value) -> String {
    match script {
        Value::String(s) => s.clone(),
        Value::Object(map) => ["opening", "intro", "body1", "body2", "body3", "conclusion"]
            .iter()
            .filter_map(|k| map.get(*k).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Ready,
    Review,
    Done,
}

pub struct ImagePrompterAgent {
    llm: Arc<dyn Llm>,
    prompts: Arc<PromptSet>,
    progress: ProgressHandle,

    status: AgentStatus,
    phase: Phase,
    script_lines: Vec<String>,
    character_desc: String,
    generated: Vec<Value>,
}

impl ImagePrompterAgent {
    pub fn new(llm: Arc<dyn Llm>, prompts: Arc<PromptSet>, progress: ProgressHandle) -> Self {
        Self {
            llm,
            prompts,
            progress,
            status: AgentStatus::Idle,
            phase: Phase::Ready,
            script_lines: Vec::new(),
            character_desc: String::new(),
            generated: Vec::new(),
        }
    }

    fn system_prompt(&self) -> String {
        render(
            &self.prompts.scene_prompt_system,
            &[
                ("style", "flat cartoon, bold outlines"),
                ("character_desc", &self.character_desc),
                ("clothing", "simple casual outfit"),
            ],
        )
    }

    async fn prompt_for_line(&self, line: &str, line_num: usize) -> Value {
        self.progress.emit(
            "프롬프트 생성",
            format!("{line_num}/{}", self.script_lines.len()),
        );
        let user_prompt = format!(
            "대본 줄: {line}\n\n위 대본에 맞는 이미지 프롬프트와 영상 프롬프트를 생성해줘."
        );
        let full = format!("{}\n\n{user_prompt}", self.system_prompt());

        match self
            .llm
            .generate(&full, ChatOptions::default().with_max_tokens(1024))
            .await
        {
            Ok(text) => match extract_object(&text) {
                Some(map) => json!({
                    "line_num": line_num,
                    "script_line": line,
                    "image_prompt": map.get("image_prompt").and_then(Value::as_str).unwrap_or(""),
                    "video_prompt": map.get("video_prompt").and_then(Value::as_str).unwrap_or(""),
                    "expression": map.get("expression").and_then(Value::as_str).unwrap_or(""),
                    "props": map.get("props").cloned().unwrap_or_else(|| json!([])),
                }),
                None => json!({
                    "line_num": line_num,
                    "script_line": line,
                    "image_prompt": "",
                    "video_prompt": "",
                    "expression": "",
                    "props": [],
                    "error": "JSON 파싱 실패",
                }),
            },
            Err(e) => json!({
                "line_num": line_num,
                "script_line": line,
                "image_prompt": "",
                "video_prompt": "",
                "expression": "",
                "props": [],
                "error": e.to_string(),
            }),
        }
    }

    fn format_results(&self) -> String {
        let mut out = format!(
            "# 장면 프롬프트 {}개 생성 완료\n\n",
            self.generated.len()
        );
        for prompt in &self.generated {
            let n = prompt.get("line_num").and_then(Value::as_u64).unwrap_or(0);
            let line = prompt
                .get("script_line")
                .and_then(Value::as_str)
                .unwrap_or("");
            let excerpt: String = line.chars().take(40).collect();
            let marker = if prompt.get("error").is_some() { " ⚠" } else { "" };
            out.push_str(&format!("- 장면 {n}: {excerpt}{marker}\n"));
        }
        out.push_str(
            "\n**확인**을 입력하거나, 수정할 장면 번호와 내용을 알려주세요.\n예: \"3번 더 밝은 표정으로\"",
        );
        out
    }

    async fn generate_all(&mut self) -> AgentResult {
        self.status = AgentStatus::Running;
        let mut generated = Vec::with_capacity(self.script_lines.len());
        for (i, line) in self.script_lines.clone().iter().enumerate() {
            generated.push(self.prompt_for_line(line, i + 1).await);
        }
        self.generated = generated;
        self.phase = Phase::Review;
        self.status = AgentStatus::WaitingFeedback;

        AgentResult::ok("image_prompt_review", self.format_results())
            .with_data("prompts", Value::Array(self.generated.clone()))
            .awaiting_feedback()
    }

    async fn modify_scene(&mut self, line_num: usize, instruction: &str) -> AgentResult {
        if line_num == 0 || line_num > self.generated.len() {
            return AgentResult::ok(
                "image_prompt_review",
                format!("장면 번호는 1~{} 사이여야 합니다.", self.generated.len()),
            )
            .awaiting_feedback();
        }
        self.progress
            .emit("장면 수정", format!("장면 {line_num}"));

        let original = &self.generated[line_num - 1];
        let user_prompt = format!(
            "대본 줄: {}\n\n기존 이미지 프롬프트: {}\n기존 영상 프롬프트: {}\n\n\
수정 요청: {instruction}\n\n위 수정 요청을 반영해서 프롬프트를 다시 생성해줘.",
            original.get("script_line").and_then(Value::as_str).unwrap_or(""),
            original.get("image_prompt").and_then(Value::as_str).unwrap_or(""),
            original.get("video_prompt").and_then(Value::as_str).unwrap_or(""),
        );
        let full = format!("{}\n\n{user_prompt}", self.system_prompt());

        match self
            .llm
            .generate(&full, ChatOptions::default().with_max_tokens(1024))
            .await
        {
            Ok(text) => {
                if let Some(map) = extract_object(&text) {
                    let line = original
                        .get("script_line")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    self.generated[line_num - 1] = json!({
                        "line_num": line_num,
                        "script_line": line,
                        "image_prompt": map.get("image_prompt").and_then(Value::as_str).unwrap_or(""),
                        "video_prompt": map.get("video_prompt").and_then(Value::as_str).unwrap_or(""),
                        "expression": map.get("expression").and_then(Value::as_str).unwrap_or(""),
                        "props": map.get("props").cloned().unwrap_or_else(|| json!([])),
                    });
                    AgentResult::ok(
                        "image_prompt_review",
                        format!("장면 {line_num} 프롬프트를 수정했습니다.\n\n{}", self.format_results()),
                    )
                    .with_data("prompts", Value::Array(self.generated.clone()))
                    .awaiting_feedback()
                } else {
                    AgentResult::ok(
                        "image_prompt_review",
                        "수정 결과를 해석하지 못했습니다. 다시 시도해주세요.",
                    )
                    .awaiting_feedback()
                }
            }
            Err(e) => AgentResult::failed(
                "image_prompt_review",
                format!("장면 수정 실패: {e}"),
            )
            .awaiting_feedback(),
        }
    }
}

#[async_trait]
impl Agent for ImagePrompterAgent {
    fn name(&self) -> &str {
        "image_prompter"
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError> {
        let Some(script) = input.get(keys::SCRIPT) else {
            self.status = AgentStatus::WaitingFeedback;
            return Ok(AgentResult::ok(
                "image_prompt",
                "대본이 없습니다. 먼저 대본을 작성해주세요.",
            )
            .awaiting_feedback());
        };

        self.character_desc = input
            .get_object(keys::CHARACTER_INFO)
            .map(|info| {
                ["character_type", "gender", "clothing", "expression", "art_style"]
                    .iter()
                    .filter_map(|k| info.get(*k).and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "friendly single character".into());

        let text = script_to_text(script);
        self.script_lines = split_script(&text);
        if self.script_lines.is_empty() {
            self.status = AgentStatus::WaitingFeedback;
            return Ok(AgentResult::ok(
                "image_prompt",
                "대본에서 장면을 추출하지 못했습니다. 대본을 확인해주세요.",
            )
            .awaiting_feedback());
        }

        Ok(self.generate_all().await)
    }

    async fn handle_feedback(
        &mut self,
        feedback: &str,
        _images: &[String],
    ) -> Result<AgentResult, StudioError> {
        if intent::is_skip(feedback) {
            self.status = AgentStatus::Completed;
            return Ok(AgentResult::skipped("image_prompt_skipped"));
        }

        let result = match self.phase {
            Phase::Ready => {
                self.script_lines = split_script(feedback);
                if self.script_lines.is_empty() {
                    AgentResult::ok("image_prompt", "대본을 입력해주세요.").awaiting_feedback()
                } else {
                    self.generate_all().await
                }
            }
            Phase::Review => {
                if intent::is_confirmation(feedback) {
                    self.phase = Phase::Done;
                    self.status = AgentStatus::Completed;
                    AgentResult::ok(
                        "image_prompt_done",
                        "프롬프트가 확정되었습니다!\n\n다음 단계로 진행합니다.",
                    )
                    .with_data("prompts", Value::Array(self.generated.clone()))
                } else if let Some((n, instruction)) = intent::extract_scene_instruction(feedback)
                {
                    self.modify_scene(n, &instruction).await
                } else if feedback.contains("다시") || feedback.contains("재생성") {
                    self.generate_all().await
                } else {
                    AgentResult::ok(
                        "image_prompt_review",
                        "**확인**을 입력하거나, 수정할 장면 번호와 내용을 알려주세요.\n예: \"3번 더 밝은 표정으로\"",
                    )
                    .awaiting_feedback()
                }
            }
            Phase::Done => AgentResult::ok("image_prompt_done", "프롬프트가 이미 확정되었습니다.")
                .with_data("prompts", Value::Array(self.generated.clone())),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_short_fragments() {
        let lines = split_script("첫 번째 문장입니다. 짧다. 두 번째 문장도 있습니다! 마지막인가요?");
        assert_eq!(
            lines,
            vec![
                "첫 번째 문장입니다.",
                "두 번째 문장도 있습니다!",
                "마지막인가요?"
            ]
        );
    }

    #[test]
    fn split_keeps_decimal_points_inside_sentences() {
        let lines = split_script("수익률이 3.5배나 올랐습니다. 놀랍지 않나요?");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("3.5배"));
    }

    #[test]
    fn split_handles_trailing_text_without_punctuation() {
        let lines = split_script("마침표가 없는 마지막 문장");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn script_object_joins_sections_in_order() {
        let script = json!({
            "opening": "오프닝 문장입니다.",
            "conclusion": "결론 문장입니다.",
            "body1": "본론 문장입니다."
        });
        let text = script_to_text(&script);
        assert!(text.starts_with("오프닝"));
        assert!(text.ends_with("결론 문장입니다."));
    }
}
