//! Planner agent: the text-heavy stages (channel naming, video ideas,
//! script). One LLM call per proposal, JSON payload extracted with the
//! shared utility, placeholder fallbacks when parsing fails so the workflow
//! can always continue.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use super::{Agent, AgentResult, AgentStatus};
use crate::adapters::{ChatOptions, Llm};
use crate::context::{keys, SessionContext};
use crate::error::StudioError;
use crate::json_extract::extract_object;
use crate::progress::ProgressHandle;
use crate::prompts::{render, PromptSet};

/// Which proposal the planner is currently driving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlannerStep {
    ChannelName,
    VideoIdeas,
    Script,
}

impl PlannerStep {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "channel_name" => Some(Self::ChannelName),
            "video_ideas" => Some(Self::VideoIdeas),
            "script" => Some(Self::Script),
            _ => None,
        }
    }
}

pub struct PlannerAgent {
    llm: Arc<dyn Llm>,
    prompts: Arc<PromptSet>,
    progress: ProgressHandle,
    status: AgentStatus,
    step: PlannerStep,
    last_input: SessionContext,
}

impl PlannerAgent {
    pub fn new(llm: Arc<dyn Llm>, prompts: Arc<PromptSet>, progress: ProgressHandle) -> Self {
        Self {
            llm,
            prompts,
            progress,
            status: AgentStatus::Idle,
            step: PlannerStep::ChannelName,
            last_input: SessionContext::new(),
        }
    }

    fn selection_options(items: &[Value], label_key: &str, desc_key: Option<&str>) -> Value {
        let options: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let label = match item {
                    Value::String(s) => s.clone(),
                    other => other
                        .get(label_key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                };
                let mut option = json!({"id": i + 1, "label": label});
                if let Some(dk) = desc_key {
                    if let Some(desc) = item.get(dk).and_then(Value::as_str) {
                        option["description"] = json!(desc);
                    }
                }
                option
            })
            .collect();
        Value::Array(options)
    }

    async fn generate_channel_names(
        &mut self,
        input: &SessionContext,
        feedback: Option<&str>,
    ) -> AgentResult {
        self.status = AgentStatus::Running;
        self.progress.emit("채널명 생성", "");

        let user_request = input.get_str(keys::USER_REQUEST).unwrap_or("유튜브 채널");
        let request = match feedback {
            Some(fb) => format!("{user_request}\n추가 요청: {fb}"),
            None => user_request.to_string(),
        };
        let prompt = render(&self.prompts.channel_name, &[("user_request", &request)]);

        let response = self
            .llm
            .generate(&prompt, ChatOptions::default().with_temperature(0.8))
            .await;

        let names: Vec<Value> = match response {
            Ok(text) => extract_object(&text)
                .and_then(|m| m.get("channel_names").and_then(Value::as_array).cloned())
                .unwrap_or_else(|| {
                    warn!("channel name payload unparseable, using placeholders");
                    vec![json!("채널1"), json!("채널2"), json!("채널3")]
                }),
            Err(e) => {
                self.status = AgentStatus::Error;
                return AgentResult::failed("channel_name", format!("채널명 생성 실패: {e}"));
            }
        };

        self.status = AgentStatus::WaitingFeedback;
        AgentResult::ok(
            "channel_name",
            "채널명을 추천해드릴게요! 원하는 번호를 클릭하거나 입력하세요:",
        )
        .with_data(keys::CHANNEL_NAMES, Value::Array(names.clone()))
        .with_data("type", json!("selection"))
        .with_data("options", Self::selection_options(&names, "label", None))
        .awaiting_feedback()
    }

    async fn generate_video_ideas(
        &mut self,
        input: &SessionContext,
        topic: Option<&str>,
    ) -> AgentResult {
        self.status = AgentStatus::Running;
        self.progress.emit("아이디어 생성", "");

        let channel_name = input
            .get_str(keys::SELECTED_CHANNEL_NAME)
            .unwrap_or("내 채널");
        let concept = input
            .get_object(keys::BENCHMARK_REPORT)
            .and_then(|r| r.get("channel_concept"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let topic = topic.or_else(|| input.get_str("user_topic")).unwrap_or("");
        let prompt = render(
            &self.prompts.video_ideas,
            &[
                ("channel_name", channel_name),
                ("channel_concept", concept),
                ("user_topic", topic),
            ],
        );

        let response = self
            .llm
            .generate(
                &prompt,
                ChatOptions::default()
                    .with_temperature(0.8)
                    .with_max_tokens(4096),
            )
            .await;

        let ideas: Vec<Value> = match response {
            Ok(text) => extract_object(&text)
                .and_then(|m| m.get("ideas").and_then(Value::as_array).cloned())
                .unwrap_or_else(|| {
                    warn!("idea payload unparseable, using placeholders");
                    vec![json!({
                        "title": "첫 영상 아이디어",
                        "hook": "기본 제안",
                        "summary": "아이디어 생성 응답을 해석하지 못해 기본값을 제안합니다."
                    })]
                }),
            Err(e) => {
                self.status = AgentStatus::Error;
                return AgentResult::failed("video_ideas", format!("아이디어 생성 실패: {e}"));
            }
        };

        let ideas: Vec<Value> = ideas.into_iter().take(10).collect();
        self.status = AgentStatus::WaitingFeedback;
        AgentResult::ok(
            "video_ideas",
            "영상 아이디어를 생성했어요! 원하는 번호를 선택하세요:",
        )
        .with_data("ideas", Value::Array(ideas.clone()))
        .with_data("type", json!("selection"))
        .with_data("options", Self::selection_options(&ideas, "title", Some("hook")))
        .awaiting_feedback()
    }

    async fn generate_script(&mut self, input: &SessionContext) -> AgentResult {
        self.status = AgentStatus::Running;
        self.progress.emit("대본 작성", "");

        let idea = input.get(keys::SELECTED_VIDEO_IDEA);
        let video_title = idea
            .and_then(|i| i.get("title").and_then(Value::as_str))
            .or_else(|| idea.and_then(Value::as_str))
            .unwrap_or("영상");
        let character_name = input
            .get_object(keys::CHARACTER_INFO)
            .and_then(|c| c.get("personality_vibe"))
            .and_then(Value::as_str)
            .unwrap_or("진행자");
        let prompt = render(
            &self.prompts.script,
            &[
                ("video_title", video_title),
                ("character_name", character_name),
            ],
        );

        let response = self
            .llm
            .generate(
                &prompt,
                ChatOptions::default()
                    .with_temperature(0.7)
                    .with_max_tokens(8192),
            )
            .await;

        let payload: Map<String, Value> = match response {
            Ok(text) => extract_object(&text)
                .filter(|m| m.contains_key("script"))
                .unwrap_or_else(|| {
                    warn!("script payload unparseable, using placeholder sections");
                    let mut m = Map::new();
                    m.insert(
                        "script".into(),
                        json!({
                            "opening": "오프닝...",
                            "intro": "인트로...",
                            "body1": "본론1...",
                            "body2": "본론2...",
                            "body3": "본론3...",
                            "conclusion": "결론..."
                        }),
                    );
                    m
                }),
            Err(e) => {
                self.status = AgentStatus::Error;
                return AgentResult::failed("script", format!("대본 작성 실패: {e}"));
            }
        };

        let opening_excerpt: String = payload
            .get("script")
            .and_then(|s| s.get("opening"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .chars()
            .take(300)
            .collect();

        self.status = AgentStatus::WaitingFeedback;
        let mut result = AgentResult::ok(
            "script",
            format!(
                "대본을 작성했어요:\n\n**[오프닝]**\n{opening_excerpt}...\n\n\"확정\"을 입력하면 완료됩니다."
            ),
        )
        .awaiting_feedback();
        result.data = payload;
        result
    }

    async fn run_step(
        &mut self,
        input: &SessionContext,
        feedback: Option<&str>,
    ) -> AgentResult {
        match self.step {
            PlannerStep::ChannelName => self.generate_channel_names(input, feedback).await,
            PlannerStep::VideoIdeas => self.generate_video_ideas(input, feedback).await,
            PlannerStep::Script => self.generate_script(input).await,
        }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError> {
        self.step = input
            .get_str("step")
            .and_then(PlannerStep::parse)
            .unwrap_or(PlannerStep::ChannelName);
        self.last_input = input.clone();
        Ok(self.run_step(&self.last_input.clone(), None).await)
    }

    async fn handle_feedback(
        &mut self,
        feedback: &str,
        _images: &[String],
    ) -> Result<AgentResult, StudioError> {
        if super::intent::is_skip(feedback) {
            self.status = AgentStatus::Completed;
            return Ok(AgentResult::skipped("planner_skipped"));
        }
        // Free-text feedback regenerates the current proposal with the
        // user's adjustment folded into the prompt.
        let input = self.last_input.clone();
        Ok(self.run_step(&input, Some(feedback)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterError;
    use crate::message::ChatMessage;
    use std::sync::Mutex;

    /// Scripted LLM that pops queued responses in order.
    pub struct QueuedLlm {
        responses: Mutex<Vec<Result<String, AdapterError>>>,
    }

    impl QueuedLlm {
        pub fn new(responses: Vec<Result<String, AdapterError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl Llm for QueuedLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _opts: ChatOptions,
        ) -> Result<String, AdapterError> {
            let mut queue = self.responses.lock().unwrap();
            if queue.is_empty() {
                Ok("{}".into())
            } else {
                queue.remove(0)
            }
        }
    }

    fn planner(llm: Arc<dyn Llm>) -> PlannerAgent {
        PlannerAgent::new(
            llm,
            Arc::new(PromptSet::default()),
            ProgressHandle::detached(),
        )
    }

    #[tokio::test]
    async fn channel_names_come_back_as_selection() {
        let llm = QueuedLlm::new(vec![Ok(
            r#"{"channel_names": ["A", "B", "C"], "reasoning": "r"}"#.into()
        )]);
        let mut agent = planner(llm);
        let mut input = SessionContext::new();
        input.set("step", json!("channel_name"));
        input.set(keys::USER_REQUEST, json!("경제 채널"));

        let result = agent.execute(&input).await.unwrap();
        assert!(result.success);
        assert!(result.needs_feedback);
        assert_eq!(result.data["channel_names"], json!(["A", "B", "C"]));
        assert_eq!(result.data["options"][1]["label"], "B");
        assert_eq!(agent.status(), AgentStatus::WaitingFeedback);
    }

    #[tokio::test]
    async fn unparseable_names_fall_back_to_placeholders() {
        let llm = QueuedLlm::new(vec![Ok("no json at all".into())]);
        let mut agent = planner(llm);
        let mut input = SessionContext::new();
        input.set("step", json!("channel_name"));

        let result = agent.execute(&input).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data["channel_names"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn llm_failure_becomes_error_result_not_panic() {
        let llm = QueuedLlm::new(vec![Err(AdapterError::transient("down"))]);
        let mut agent = planner(llm);
        let mut input = SessionContext::new();
        input.set("step", json!("script"));

        let result = agent.execute(&input).await.unwrap();
        assert!(!result.success);
        assert_eq!(agent.status(), AgentStatus::Error);
    }

    #[tokio::test]
    async fn script_payload_merges_whole_object() {
        let llm = QueuedLlm::new(vec![Ok(
            r#"{"script": {"opening": "안녕", "intro": "i", "body1": "1", "body2": "2", "body3": "3", "conclusion": "c"}, "estimated_duration": "10분"}"#.into(),
        )]);
        let mut agent = planner(llm);
        let mut input = SessionContext::new();
        input.set("step", json!("script"));
        input.set(keys::SELECTED_VIDEO_IDEA, json!({"title": "제목"}));

        let result = agent.execute(&input).await.unwrap();
        assert!(result.data.contains_key("script"));
        assert_eq!(result.data["estimated_duration"], "10분");
        assert!(result.message.contains("안녕"));
    }
}
