//! Orchestrator: per-session workflow driver.
//!
//! Sequences the stage agents, routes user messages and uploaded images to
//! the active agent, merges agent output into the session context under the
//! well-known keys, advances the workflow when a stage completes, and
//! streams progress over the bus. Message processing is serialized per
//! session; distinct sessions run concurrently.

mod stage;

pub use stage::Stage;

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::ChatOptions;
use crate::agent::{
    benchmarker::BenchmarkerAgent, character::CharacterAgent, composer::ComposerAgent,
    image_generator::ImageGeneratorAgent, image_prompter::ImagePrompterAgent, intent,
    planner::PlannerAgent, voiceover::VoiceoverAgent, Agent, AgentResult, AgentStatus,
};
use crate::context::{keys, SessionContext};
use crate::error::StudioError;
use crate::message::{strip_data_url, AgentMessage};
use crate::progress::ProgressHandle;
use crate::registry::Registry;
use crate::session::{Session, SessionStore};

/// What the client receives for every call.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Response {
    pub session_id: String,
    pub current_stage: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub needs_feedback: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    pub context: SessionContext,
}

/// The per-session mutable agents. Locking this struct serializes all
/// message processing on the session.
struct SessionAgents {
    planner: PlannerAgent,
    benchmarker: BenchmarkerAgent,
    character: CharacterAgent,
    image_prompter: ImagePrompterAgent,
    image_generator: ImageGeneratorAgent,
    voiceover: VoiceoverAgent,
    composer: ComposerAgent,
}

impl SessionAgents {
    fn new(registry: &Registry, progress: ProgressHandle) -> Self {
        Self {
            planner: PlannerAgent::new(
                registry.llm.clone(),
                registry.prompts.clone(),
                progress.clone(),
            ),
            benchmarker: BenchmarkerAgent::new(
                registry.llm.clone(),
                registry.vision.clone(),
                registry.youtube.clone(),
                registry.capture.clone(),
                registry.cache.clone(),
                registry.prompts.clone(),
                progress.clone(),
            ),
            character: CharacterAgent::new(
                registry.llm.clone(),
                registry.vision.clone(),
                registry.engine.clone(),
                registry.engine_input_dir.clone(),
                progress.clone(),
            ),
            image_prompter: ImagePrompterAgent::new(
                registry.llm.clone(),
                registry.prompts.clone(),
                progress.clone(),
            ),
            image_generator: ImageGeneratorAgent::new(
                registry.engine.clone(),
                registry.vision.clone(),
                registry.runner.clone(),
                &registry.ffmpeg_bin,
                registry.paths.clone(),
                registry.engine_input_dir.clone(),
                progress.clone(),
            ),
            voiceover: VoiceoverAgent::new(
                registry.tts.clone(),
                registry.youtube.clone(),
                registry.paths.clone(),
                progress.clone(),
                registry.tts_default_speaker.clone(),
            ),
            composer: ComposerAgent::new(
                registry.runner.clone(),
                registry.paths.clone(),
                progress.clone(),
                &registry.ffmpeg_bin,
                &registry.ffprobe_bin,
            ),
        }
    }

    fn for_stage(&mut self, stage: Stage) -> &mut dyn Agent {
        match stage {
            Stage::Benchmarking => &mut self.benchmarker,
            Stage::Character => &mut self.character,
            Stage::ImagePrompt => &mut self.image_prompter,
            Stage::ImageGenerate => &mut self.image_generator,
            Stage::Voiceover => &mut self.voiceover,
            Stage::Compose => &mut self.composer,
            // Text stages and the transitions between them live on the planner.
            _ => &mut self.planner,
        }
    }
}

struct Inner {
    registry: Registry,
    store: Arc<dyn SessionStore>,
    agents: DashMap<String, Arc<Mutex<SessionAgents>>>,
}

/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(registry: Registry, store: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                store,
                agents: DashMap::new(),
            }),
        }
    }

    fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    fn agents_for(&self, session_id: &str) -> Arc<Mutex<SessionAgents>> {
        self.inner
            .agents
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let handle = self.inner.registry.bus.handle(session_id);
                Arc::new(Mutex::new(SessionAgents::new(&self.inner.registry, handle)))
            })
            .clone()
    }

    fn response(session: &Session, result: AgentResult) -> Response {
        Response {
            session_id: session.id.clone(),
            current_stage: session.current_stage.as_str().to_string(),
            message: result.message,
            images: result.images,
            needs_feedback: result.needs_feedback,
            success: result.success,
            data: result.data,
            context: session.context.clone(),
        }
    }

    /// Merges a result's payload into the context under the well-known keys.
    fn merge_result(context: &mut SessionContext, result: &AgentResult) {
        if result.is_skipped() {
            return;
        }
        const DIRECT: &[(&str, &str)] = &[
            ("channel_names", keys::CHANNEL_NAMES),
            ("selected_channel_name", keys::SELECTED_CHANNEL_NAME),
            ("report", keys::BENCHMARK_REPORT),
            ("character_info", keys::CHARACTER_INFO),
            ("character_image", keys::CHARACTER_IMAGE),
            ("ideas", keys::VIDEO_IDEAS),
            ("selected_video_idea", keys::SELECTED_VIDEO_IDEA),
            ("script", keys::SCRIPT),
            ("images", keys::GENERATED_IMAGES),
            ("videos", keys::GENERATED_VIDEOS),
            ("qc_results", keys::QC_RESULTS),
            ("sections", keys::VOICE_SECTIONS),
            ("final_video", keys::FINAL_VIDEO),
            ("subtitle_file", keys::SUBTITLE_FILE),
        ];
        for (data_key, ctx_key) in DIRECT {
            if let Some(value) = result.data.get(*data_key) {
                context.set(*ctx_key, value.clone());
            }
        }
        if let Some(prompts) = result.data.get("prompts") {
            context.set(keys::IMAGE_PROMPTS, json!({"prompts": prompts}));
        }
    }

    /// Stage-local input for an agent's `execute`: the context plus
    /// session/stage overrides.
    fn execute_input(session: &Session, stage: Stage) -> SessionContext {
        let mut input = session.context.clone();
        input.set(keys::SESSION_ID, json!(session.id));
        match stage {
            Stage::ChannelName => input.set("step", json!("channel_name")),
            Stage::VideoIdeas => input.set("step", json!("video_ideas")),
            Stage::Script => input.set("step", json!("script")),
            Stage::ImageGenerate => {
                input.set("prompts", Value::Array(session.context.image_prompt_list()));
                input.set("generate_videos", json!(true));
                input.set("enable_qc", json!(true));
            }
            Stage::Compose => {
                input.set(
                    "videos",
                    session
                        .context
                        .get(keys::GENERATED_VIDEOS)
                        .cloned()
                        .unwrap_or_else(|| json!([])),
                );
                input.set(
                    "audios",
                    session
                        .context
                        .get(keys::VOICE_SECTIONS)
                        .cloned()
                        .unwrap_or_else(|| json!([])),
                );
                input.set("prompts", Value::Array(session.context.image_prompt_list()));
            }
            _ => {}
        }
        input
    }

    fn completion_result(session: &Session) -> AgentResult {
        let channel = session
            .context
            .get_str(keys::SELECTED_CHANNEL_NAME)
            .unwrap_or("");
        let idea_title = session
            .context
            .get(keys::SELECTED_VIDEO_IDEA)
            .map(|idea| {
                idea.get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| idea.to_string())
            })
            .unwrap_or_default();

        let mut message = format!(
            "**영상 제작이 완료되었습니다!**\n\n**채널명:** {channel}\n**영상 주제:** {idea_title}\n"
        );
        if session.context.contains(keys::BENCHMARK_REPORT) {
            message.push_str("**벤치마킹:** 완료\n");
        }
        if let Some(video) = session.context.get_str(keys::FINAL_VIDEO) {
            message.push_str(&format!("\n**최종 영상:** `{video}`"));
        }

        let mut result = AgentResult::ok("completed", message);
        result.data = session.context.0.clone();
        result
    }

    /// Advances to the next stage and runs its agent, continuing while
    /// completed stages keep falling through. A skip-initiated advance does
    /// not merge the next stage's proposal data, so skipped-through runs
    /// leave no stage-specific keys behind.
    async fn advance(
        &self,
        session: &mut Session,
        agents: &mut SessionAgents,
        from_skip: bool,
    ) -> Result<AgentResult, StudioError> {
        loop {
            let Some(next) = session.current_stage.next() else {
                return Ok(Self::completion_result(session));
            };
            session.current_stage = next;
            info!(session = %session.id, stage = next.as_str(), "stage advance");

            if next == Stage::Completed {
                return Ok(Self::completion_result(session));
            }
            if next == Stage::TtsSettings {
                // Inline option machine; no agent to execute.
                return Ok(Self::tts_options_result());
            }

            let input = Self::execute_input(session, next);
            let agent = agents.for_stage(next);
            let result = agent.execute(&input).await?;
            let status = agent.status();
            if !from_skip {
                Self::merge_result(&mut session.context, &result);
            }

            if result.needs_feedback {
                return Ok(result);
            }
            // A stage that finished instantly (skip chains, completed
            // execute) falls through to the next one; anything else stays
            // put so the user can react.
            if !(result.is_skipped() || status == AgentStatus::Completed) {
                return Ok(result);
            }
        }
    }

    // ---- TTS settings (inline option machine) ---------------------------

    fn tts_options_result() -> AgentResult {
        AgentResult::ok(
            "tts_settings",
            "캐릭터가 확정되었습니다! 이제 음성 설정을 해주세요.\n\n\
**음성 옵션을 선택해주세요:**\n\n\
1. **기본 보이스** — 바로 사용 가능\n\
2. **보이스 클로닝** — YouTube 영상 또는 저장된 샘플 사용\n\n\
번호를 입력해주세요. (1 또는 2)",
        )
        .with_data(
            "options",
            json!([
                {"id": 1, "label": "기본 보이스"},
                {"id": 2, "label": "보이스 클로닝"}
            ]),
        )
        .awaiting_feedback()
    }

    fn tts_complete_message(session: &Session, description: &str) -> String {
        let channel = session
            .context
            .get_str(keys::SELECTED_CHANNEL_NAME)
            .unwrap_or("채널");
        format!(
            "음성 설정이 완료되었습니다!\n{description}\n\n\
**{channel}** 채널 설정이 완료되었습니다!\n\n\
이제 어떤 주제의 영상을 만들까요? 주제나 아이디어를 입력해주세요."
        )
    }

    async fn handle_tts_settings(&self, session: &mut Session, message: &str) -> AgentResult {
        let trimmed = message.trim();
        let lower = trimmed.to_lowercase();
        let ctx = &mut session.context;

        // Waiting for a cloning sub-step?
        match ctx.get_str(keys::TTS_CLONE_MODE).map(str::to_string) {
            Some(mode) if mode == "youtube" => {
                if ctx.get_str(keys::TTS_YOUTUBE_URL).is_none() {
                    if message.contains("youtube.com") || message.contains("youtu.be") {
                        ctx.set(keys::TTS_YOUTUBE_URL, json!(trimmed));
                        return AgentResult::ok(
                            "tts_settings",
                            "YouTube URL이 저장되었습니다. 음성을 추출할 시간대를 입력해주세요.\n예: 0:30-0:45",
                        )
                        .awaiting_feedback();
                    }
                    return AgentResult::ok(
                        "tts_settings",
                        "올바른 YouTube URL을 입력해주세요.\n예: https://youtube.com/watch?v=...",
                    )
                    .awaiting_feedback();
                }
                if crate::agent::voiceover::parse_time_window(trimmed).is_none() {
                    return AgentResult::ok(
                        "tts_settings",
                        "시간대 형식이 올바르지 않습니다. 예: 0:30-0:45",
                    )
                    .awaiting_feedback();
                }
                ctx.set(keys::TTS_YOUTUBE_TIME, json!(trimmed));
                ctx.set(keys::TTS_VOICE_OPTION, json!("youtube"));
                ctx.remove(keys::TTS_CLONE_MODE);
                session.current_stage = Stage::VideoIdeas;
                return AgentResult::ok(
                    "video_ideas",
                    Self::tts_complete_message(session, "- 방식: YouTube 보이스 클로닝"),
                )
                .awaiting_feedback();
            }
            Some(mode) if mode == "sample" => {
                if let Some(n) = intent::extract_selection(trimmed) {
                    ctx.set(keys::TTS_SAMPLE_IDX, json!(n.saturating_sub(1)));
                    ctx.set(keys::TTS_VOICE_OPTION, json!("sample"));
                    ctx.remove(keys::TTS_CLONE_MODE);
                    session.current_stage = Stage::VideoIdeas;
                    return AgentResult::ok(
                        "video_ideas",
                        Self::tts_complete_message(session, "- 방식: 저장된 샘플 사용"),
                    )
                    .awaiting_feedback();
                }
                return AgentResult::ok("tts_settings", "올바른 번호를 입력해주세요.")
                    .awaiting_feedback();
            }
            _ => {}
        }

        // The clone-type menu was shown; interpret 1/2 against it.
        if ctx.get_str("tts_menu") == Some("clone") {
            ctx.remove("tts_menu");
            if lower.contains('1') || lower.contains("youtube") || lower.contains("yt") {
                ctx.set(keys::TTS_CLONE_MODE, json!("youtube"));
                return AgentResult::ok(
                    "tts_settings",
                    "복제할 목소리가 있는 YouTube 영상 URL을 입력해주세요.",
                )
                .awaiting_feedback();
            }
            if lower.contains('2') || lower.contains("샘플") || lower.contains("sample") {
                ctx.set(keys::TTS_CLONE_MODE, json!("sample"));
                return AgentResult::ok(
                    "tts_settings",
                    "저장된 샘플 번호를 입력해주세요. (샘플 목록은 보이스오버 단계에서 확인됩니다)",
                )
                .awaiting_feedback();
            }
            return AgentResult::ok("tts_settings", "1 또는 2를 입력해주세요.").awaiting_feedback();
        }

        // Top-level menu.
        if lower == "1" || lower.contains("기본") || lower.contains("default") {
            ctx.set(keys::TTS_VOICE_OPTION, json!("default"));
            ctx.set(
                keys::TTS_SPEAKER,
                json!(self.registry().tts_default_speaker),
            );
            session.current_stage = Stage::VideoIdeas;
            return AgentResult::ok(
                "video_ideas",
                Self::tts_complete_message(session, "- 음성: 기본 보이스"),
            )
            .awaiting_feedback();
        }
        if lower == "2" || lower.contains("클로닝") || lower.contains("clone") {
            ctx.set("tts_menu", json!("clone"));
            return AgentResult::ok(
                "tts_settings",
                "**보이스 클로닝 방식을 선택해주세요:**\n\n\
1. YouTube 영상에서 추출\n2. 저장된 샘플 사용\n\n번호를 입력해주세요. (1 또는 2)",
            )
            .with_data(
                "options",
                json!([
                    {"id": 1, "label": "YouTube에서 추출"},
                    {"id": 2, "label": "저장된 샘플"}
                ]),
            )
            .awaiting_feedback();
        }

        AgentResult::ok("tts_settings", "1 또는 2를 입력해주세요.").awaiting_feedback()
    }

    // ---- character confirmation gate ------------------------------------

    async fn character_intro(&self, session: &Session, info: &Map<String, Value>) -> String {
        let channel = session
            .context
            .get_str(keys::SELECTED_CHANNEL_NAME)
            .unwrap_or("");
        let described: Vec<&str> = ["character_type", "clothing", "expression", "art_style"]
            .iter()
            .filter_map(|k| info.get(*k).and_then(Value::as_str))
            .collect();

        let mut lines = vec![if channel.is_empty() {
            "채널의 얼굴이 될 캐릭터를 만났어요!".to_string()
        } else {
            format!("**{channel}** 채널의 얼굴이 될 캐릭터를 만났어요!")
        }];
        if !described.is_empty() {
            lines.push(format!("**캐릭터:** {}", described.join(", ")));
        }

        // A short witty role suggestion; failure falls back to a stock line.
        let prompt = format!(
            "유튜브 채널 캐릭터 소개 멘트를 1-2문장으로 작성해주세요.\n\
채널명: {channel}\n캐릭터: {}\n위트있게, \"~하면 좋을 것 같아요!\" 형식으로.",
            described.join(", ")
        );
        match self
            .registry()
            .llm
            .generate(&prompt, ChatOptions::default().with_max_tokens(150))
            .await
        {
            Ok(text) => lines.push(text.trim().trim_matches('"').to_string()),
            Err(e) => {
                warn!(error = %e, "character intro suggestion failed");
                lines.push("이 캐릭터로 멋진 콘텐츠를 만들어볼게요!".into());
            }
        }
        lines.join("\n\n")
    }

    /// Uploaded image plus a confirmation at CHARACTER: analyze, persist,
    /// and move straight into voice settings.
    async fn confirm_uploaded_character(
        &self,
        session: &mut Session,
        images: &[String],
    ) -> AgentResult {
        let image = images[0].clone();
        let stripped = strip_data_url(&image).to_string();

        let intro = match self.registry().vision.describe_character(&stripped).await {
            Ok(info) => {
                let intro = self.character_intro(session, &info).await;
                session
                    .context
                    .set(keys::CHARACTER_INFO, Value::Object(info));
                intro
            }
            Err(e) => {
                warn!(error = %e, "character analysis failed");
                "캐릭터 이미지를 저장했습니다.".to_string()
            }
        };
        session.context.set(keys::CHARACTER_IMAGE, json!(stripped));

        session.current_stage = Stage::TtsSettings;
        let options = Self::tts_options_result();
        AgentResult::ok(
            "character_confirmed",
            format!("{intro}\n\n---\n\n{}", options.message),
        )
        .with_images(vec![image])
        .with_data("options", options.data.get("options").cloned().unwrap_or_default())
        .awaiting_feedback()
    }

    // ---- client surface -------------------------------------------------

    /// Initializes a session (generating an id when absent) and runs the
    /// first stage.
    pub async fn start_workflow(
        &self,
        user_request: &str,
        session_id: Option<String>,
    ) -> Result<Response, StudioError> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let agents = self.agents_for(&session_id);
        let mut agents = agents.lock().await;

        let mut session = self
            .inner
            .store
            .get_or_create(&session_id)
            .await
            .map_err(|e| StudioError::Store(e.to_string()))?;
        session
            .context
            .set(keys::USER_REQUEST, json!(user_request));
        session.push_history(AgentMessage::user(user_request));

        let input = Self::execute_input(&session, Stage::ChannelName);
        let result = agents.planner.execute(&input).await?;
        Self::merge_result(&mut session.context, &result);
        session.push_history(AgentMessage::assistant(&result.message));

        self.inner.store
            .save(&session)
            .await
            .map_err(|e| StudioError::Store(e.to_string()))?;
        Ok(Self::response(&session, result))
    }

    /// The main interaction endpoint.
    pub async fn process_message(
        &self,
        session_id: &str,
        message: &str,
        images: &[String],
    ) -> Result<Response, StudioError> {
        let agents = self.agents_for(session_id);
        let mut agents = agents.lock().await;

        let mut session = self
            .inner
            .store
            .get_or_create(session_id)
            .await
            .map_err(|e| StudioError::Store(e.to_string()))?;

        if message.trim().is_empty() && images.is_empty() {
            return Ok(Self::response(
                &session,
                AgentResult::failed("invalid_input", "메시지를 입력해주세요.").awaiting_feedback(),
            ));
        }

        session.push_history(AgentMessage::user(message).with_images(images.to_vec()));
        // Internal failures become a generic error response; the session is
        // retained on its current stage and nothing is thrown further out.
        let result = match self.dispatch(&mut session, &mut agents, message, images).await {
            Ok(result) => result,
            Err(e) => {
                error!(session = %session.id, error = %e, "message dispatch failed");
                AgentResult::failed(
                    "internal_error",
                    "요청을 처리하는 중 오류가 발생했습니다. 다시 시도해주세요.",
                )
                .with_data("error", json!(e.to_string()))
                .awaiting_feedback()
            }
        };
        session.push_history(AgentMessage::assistant(&result.message));

        self.inner.store
            .save(&session)
            .await
            .map_err(|e| StudioError::Store(e.to_string()))?;
        Ok(Self::response(&session, result))
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        agents: &mut SessionAgents,
        message: &str,
        images: &[String],
    ) -> Result<AgentResult, StudioError> {
        let stage = session.current_stage;

        if stage == Stage::Completed {
            return Ok(Self::completion_result(session));
        }

        // Skip: let the agent clean up, then advance.
        if intent::is_stage_skip(message) && stage != Stage::TtsSettings {
            let _ = agents
                .for_stage(stage)
                .handle_feedback(message, images)
                .await?;
            // Skipping the naming stage discards its proposal list; a
            // skipped-through session keeps only the user request.
            if stage == Stage::ChannelName {
                session.context.remove(keys::CHANNEL_NAMES);
            }
            return self.advance(session, agents, true).await;
        }

        // Stage gates.
        match stage {
            Stage::TtsSettings => {
                if intent::is_stage_skip(message) {
                    return self.advance(session, agents, true).await;
                }
                return Ok(self.handle_tts_settings(session, message).await);
            }
            Stage::Character if !images.is_empty() && intent::is_confirmation(message) => {
                return Ok(self.confirm_uploaded_character(session, images).await);
            }
            Stage::Benchmarking
                if session.context.get_bool(keys::BENCHMARK_SHOWN).unwrap_or(false)
                    && intent::is_confirmation(message) =>
            {
                return self.advance(session, agents, false).await;
            }
            Stage::ChannelName => {
                if let Some(n) = intent::extract_selection(message) {
                    let names = session
                        .context
                        .get_array(keys::CHANNEL_NAMES)
                        .cloned()
                        .unwrap_or_default();
                    if n >= 1 && n <= names.len() {
                        session
                            .context
                            .set(keys::SELECTED_CHANNEL_NAME, names[n - 1].clone());
                        return self.advance(session, agents, false).await;
                    }
                    return Ok(AgentResult::ok(
                        "channel_name",
                        format!("1~{} 사이의 번호를 입력해주세요.", names.len()),
                    )
                    .awaiting_feedback());
                }
                if intent::is_confirmation(message)
                    && session.context.contains(keys::SELECTED_CHANNEL_NAME)
                {
                    return self.advance(session, agents, false).await;
                }
                // Anything else refines the proposals.
            }
            Stage::VideoIdeas => {
                if let Some(n) = intent::extract_selection(message) {
                    let ideas = session
                        .context
                        .get_array(keys::VIDEO_IDEAS)
                        .cloned()
                        .unwrap_or_default();
                    if n >= 1 && n <= ideas.len() {
                        session
                            .context
                            .set(keys::SELECTED_VIDEO_IDEA, ideas[n - 1].clone());
                        return self.advance(session, agents, false).await;
                    }
                    return Ok(AgentResult::ok(
                        "video_ideas",
                        format!("1~{} 사이의 번호를 입력해주세요.", ideas.len()),
                    )
                    .awaiting_feedback());
                }
                if intent::is_confirmation(message) {
                    if let Some(first) = session
                        .context
                        .get_array(keys::VIDEO_IDEAS)
                        .and_then(|ideas| ideas.first().cloned())
                    {
                        session.context.set(keys::SELECTED_VIDEO_IDEA, first);
                        return self.advance(session, agents, false).await;
                    }
                }
                if message.chars().count() > 5 {
                    // A fresh topic regenerates the idea list.
                    let mut input = Self::execute_input(session, Stage::VideoIdeas);
                    input.set("user_topic", json!(message));
                    let result = agents.planner.execute(&input).await?;
                    Self::merge_result(&mut session.context, &result);
                    return Ok(result);
                }
            }
            _ => {}
        }

        // Default: the current agent interprets the feedback.
        let result = agents
            .for_stage(stage)
            .handle_feedback(message, images)
            .await?;
        let status = agents.for_stage(stage).status();

        // Benchmark bookkeeping: reanalysis restarts invalidate the shown
        // report; a fresh report is shown once and gated on confirmation.
        if stage == Stage::Benchmarking {
            if matches!(result.step.as_str(), "benchmark_confirm" | "benchmark_collect") {
                session.context.remove(keys::BENCHMARK_SHOWN);
                session.context.remove(keys::BENCHMARK_REPORT);
            }
            if result.step == "benchmark_report" {
                Self::merge_result(&mut session.context, &result);
                session.context.set(keys::BENCHMARK_SHOWN, json!(true));
                let mut gated = result;
                gated.message.push_str(
                    "\n\n---\n\n**리포트 확인 완료!**\n다음 단계로 진행하려면 확인 또는 다음을 입력하세요.",
                );
                gated.needs_feedback = true;
                return Ok(gated);
            }
        }

        Self::merge_result(&mut session.context, &result);

        // Character completion flows straight into voice settings.
        if stage == Stage::Character && result.step == "character_confirmed" {
            session.current_stage = Stage::TtsSettings;
            let options = Self::tts_options_result();
            let mut combined = result;
            combined.message = format!("{}\n\n---\n\n{}", combined.message, options.message);
            combined.needs_feedback = true;
            return Ok(combined);
        }

        if !result.needs_feedback
            && (result.is_skipped() || status == AgentStatus::Completed)
        {
            let from_skip = result.is_skipped();
            return self.advance(session, agents, from_skip).await;
        }
        Ok(result)
    }

    /// Streaming variant: progress events, then `result`, then `done` (or
    /// `error`). The returned stream closes after the terminal event.
    pub async fn process_message_stream(
        &self,
        session_id: &str,
        message: &str,
        images: &[String],
    ) -> ReceiverStream<Value> {
        let (tx, rx) = mpsc::channel::<Value>(64);
        let orchestrator = self.clone();
        let session_id = session_id.to_string();
        let message = message.to_string();
        let images = images.to_vec();

        tokio::spawn(async move {
            let bus = orchestrator.registry().bus.clone();
            bus.reset(&session_id);
            let run_id = Uuid::new_v4().to_string();
            let mut envelope = progress_event::EnvelopeState::new(session_id.clone(), run_id);

            let send = |event: progress_event::ProgressEvent,
                        envelope: &mut progress_event::EnvelopeState| {
                progress_event::to_json(&event, envelope).ok()
            };

            let mut run = {
                let orchestrator = orchestrator.clone();
                let session_id = session_id.clone();
                Box::pin(async move {
                    orchestrator
                        .process_message(&session_id, &message, &images)
                        .await
                })
            };

            let mut seen = 0usize;
            let outcome = loop {
                tokio::select! {
                    result = &mut run => break result,
                    records = bus.wait_past(&session_id, seen) => {
                        seen += records.len();
                        for record in records {
                            if let Some(value) = send(record.to_event(), &mut envelope) {
                                if tx.send(value).await.is_err() {
                                    // Consumer went away; the run keeps going.
                                    break;
                                }
                            }
                        }
                    }
                }
            };

            // Flush events emitted between the last poll and completion.
            for record in bus.read_from(&session_id, seen) {
                if let Some(value) = send(record.to_event(), &mut envelope) {
                    let _ = tx.send(value).await;
                }
            }

            match outcome {
                Ok(response) => {
                    let data = serde_json::to_value(&response).unwrap_or(Value::Null);
                    if let Some(value) =
                        send(progress_event::ProgressEvent::Result { data }, &mut envelope)
                    {
                        let _ = tx.send(value).await;
                    }
                    if let Some(value) =
                        send(progress_event::ProgressEvent::Done, &mut envelope)
                    {
                        let _ = tx.send(value).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "run failed");
                    if let Some(value) = send(
                        progress_event::ProgressEvent::Error {
                            message: e.to_string(),
                        },
                        &mut envelope,
                    ) {
                        let _ = tx.send(value).await;
                    }
                }
            }
        });

        ReceiverStream::new(rx)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StudioError> {
        self.inner.store
            .load(session_id)
            .await
            .map_err(|e| StudioError::Store(e.to_string()))
    }

    /// Removes session state, output directories containing the session id,
    /// in-memory agent instances and the progress buffer. Returns what was
    /// deleted.
    pub async fn delete_session(&self, session_id: &str) -> Result<Vec<String>, StudioError> {
        let mut deleted = Vec::new();

        if self.inner.agents.remove(session_id).is_some() {
            deleted.push("agents".to_string());
        }
        if self
            .inner
            .store
            .delete(session_id)
            .await
            .map_err(|e| StudioError::Store(e.to_string()))?
        {
            deleted.push("session".to_string());
        }
        for dir in self.registry().paths.session_owned_dirs(session_id) {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => deleted.push(format!("asset_dir:{}", dir.display())),
                Err(e) => warn!(dir = %dir.display(), error = %e, "asset dir delete failed"),
            }
        }
        if self.registry().bus.remove(session_id) {
            deleted.push("progress".to_string());
        }
        Ok(deleted)
    }
}
