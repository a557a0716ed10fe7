//! ImageGenerator agent with the integrated QC loop.
//!
//! The first scene runs plain text-to-image and becomes the character
//! reference; later scenes run an adapter style transfer keyed on it so the
//! character stays consistent. Each successful image optionally becomes a
//! short clip, and each clip optionally goes through a strict vision QC:
//! FAIL regenerates the clip until `max_regenerations` is exhausted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::warn;

use super::quality::VisionQualityChecker;
use super::{intent, Agent, AgentResult, AgentStatus};
use crate::adapters::{CommandRunner, Verdict, Vision, WorkflowEngine};
use crate::context::{keys, SessionContext};
use crate::error::StudioError;
use crate::message::strip_data_url;
use crate::paths::PathPolicy;
use crate::progress::ProgressHandle;
use crate::workflows;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(180);
const VIDEO_TIMEOUT: Duration = Duration::from_secs(600);
const QC_FRAMES: usize = 4;
pub const DEFAULT_MAX_REGENERATIONS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Ready,
    Review,
    Done,
}

pub struct ImageGeneratorAgent {
    engine: Arc<dyn WorkflowEngine>,
    qc: VisionQualityChecker,
    paths: Arc<PathPolicy>,
    engine_input_dir: Option<PathBuf>,
    progress: ProgressHandle,

    status: AgentStatus,
    phase: Phase,
    session_id: String,
    prompts: Vec<Value>,
    generate_videos: bool,
    enable_qc: bool,
    max_regenerations: u32,

    reference_b64: Option<String>,
    reference_engine_name: Option<String>,
    images: Vec<Value>,
    videos: Vec<Value>,
    qc_results: Vec<Value>,
}

impl ImageGeneratorAgent {
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        vision: Arc<dyn Vision>,
        runner: Arc<dyn CommandRunner>,
        ffmpeg: &str,
        paths: Arc<PathPolicy>,
        engine_input_dir: Option<PathBuf>,
        progress: ProgressHandle,
    ) -> Self {
        Self {
            engine,
            qc: VisionQualityChecker::new(vision, runner, ffmpeg),
            paths,
            engine_input_dir,
            progress,
            status: AgentStatus::Idle,
            phase: Phase::Ready,
            session_id: String::new(),
            prompts: Vec::new(),
            generate_videos: true,
            enable_qc: true,
            max_regenerations: DEFAULT_MAX_REGENERATIONS,
            reference_b64: None,
            reference_engine_name: None,
            images: Vec::new(),
            videos: Vec::new(),
            qc_results: Vec::new(),
        }
    }

    fn save_media(&self, b64: &str, filename: &str) -> Result<PathBuf, StudioError> {
        let dir = self.paths.session_output_dir(&self.session_id);
        std::fs::create_dir_all(&dir)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(strip_data_url(b64))
            .map_err(|e| StudioError::Parse(format!("media not base64: {e}")))?;
        let path = dir.join(filename);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Copies the reference into the engine's input dir when mounted, so
    /// style-transfer workflows can load it by name.
    fn upload_reference(&mut self, path: &PathBuf) {
        let Some(ref input_dir) = self.engine_input_dir else {
            return;
        };
        let name = format!("studio_ref_{}.png", self.session_id);
        if std::fs::create_dir_all(input_dir)
            .and_then(|_| std::fs::copy(path, input_dir.join(&name)))
            .is_ok()
        {
            self.reference_engine_name = Some(name);
        }
    }

    fn prompt_field<'a>(prompt: &'a Value, key: &str) -> &'a str {
        prompt.get(key).and_then(Value::as_str).unwrap_or("")
    }

    async fn generate_scene_image(&mut self, index: usize) -> Value {
        let prompt = self.prompts[index].clone();
        let line_num = index + 1;
        let image_prompt = Self::prompt_field(&prompt, "image_prompt").to_string();

        let workflow = if index == 0 {
            self.progress.emit("첫 캐릭터 이미지 생성", "레퍼런스 생성");
            workflows::text_to_image(&image_prompt, 1024, 1024, None)
        } else {
            self.progress
                .emit("이미지 생성", format!("{line_num}/{}", self.prompts.len()));
            match (&self.reference_engine_name, &self.reference_b64) {
                (Some(name), _) => workflows::style_transfer(&image_prompt, name, 0.7, None),
                (None, Some(reference)) => {
                    workflows::image_edit(strip_data_url(reference), &image_prompt, 0.7, None)
                }
                (None, None) => workflows::text_to_image(&image_prompt, 1024, 1024, None),
            }
        };

        match self.engine.execute(&workflow, IMAGE_TIMEOUT).await {
            Ok(outputs) if !outputs.is_empty() => {
                let b64 = outputs[0].clone();
                let filename = if index == 0 {
                    "scene_001_ref.png".to_string()
                } else {
                    format!("scene_{line_num:03}.png")
                };
                match self.save_media(&b64, &filename) {
                    Ok(path) => {
                        if index == 0 {
                            self.reference_b64 = Some(strip_data_url(&b64).to_string());
                            self.upload_reference(&path);
                        }
                        json!({
                            "line_num": line_num,
                            "image_path": path.display().to_string(),
                            "image_b64": b64,
                            "success": true,
                        })
                    }
                    Err(e) => json!({"line_num": line_num, "error": e.to_string(), "success": false}),
                }
            }
            Ok(_) => json!({"line_num": line_num, "error": "no image generated", "success": false}),
            Err(e) => {
                warn!(line_num, error = %e, "image generation failed");
                json!({"line_num": line_num, "error": e.to_string(), "success": false})
            }
        }
    }

    async fn generate_scene_video(&self, index: usize, image: &Value) -> Value {
        let prompt = &self.prompts[index];
        let line_num = index + 1;
        let video_prompt = Self::prompt_field(prompt, "video_prompt").to_string();
        self.progress
            .emit("영상 생성", format!("{line_num}/{}", self.prompts.len()));

        let image_b64 = image
            .get("image_b64")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let workflow = match &self.engine_input_dir {
            Some(input_dir) => {
                let name = format!("studio_scene_{}_{line_num:03}.png", self.session_id);
                let image_path = image.get("image_path").and_then(Value::as_str);
                let uploaded = image_path
                    .map(|p| {
                        std::fs::create_dir_all(input_dir)
                            .and_then(|_| std::fs::copy(p, input_dir.join(&name)))
                            .is_ok()
                    })
                    .unwrap_or(false);
                if uploaded {
                    workflows::image_to_video(&name, &video_prompt, 81, None)
                } else {
                    workflows::image_to_video_inline(
                        strip_data_url(image_b64),
                        &video_prompt,
                        81,
                        None,
                    )
                }
            }
            None => workflows::image_to_video_inline(
                strip_data_url(image_b64),
                &video_prompt,
                81,
                None,
            ),
        };

        match self.engine.execute(&workflow, VIDEO_TIMEOUT).await {
            Ok(outputs) if !outputs.is_empty() => {
                match self.save_media(&outputs[0], &format!("scene_{line_num:03}.mp4")) {
                    Ok(path) => json!({
                        "line_num": line_num,
                        "video_path": path.display().to_string(),
                        "success": true,
                    }),
                    Err(e) => json!({"line_num": line_num, "error": e.to_string(), "success": false}),
                }
            }
            Ok(_) => json!({"line_num": line_num, "error": "no video generated", "success": false}),
            Err(e) => {
                warn!(line_num, error = %e, "video generation failed");
                json!({"line_num": line_num, "error": e.to_string(), "success": false})
            }
        }
    }

    /// Video generation plus the QC loop: FAIL regenerates until the
    /// attempt budget runs out. Returns (video, qc_record).
    async fn generate_video_with_qc(&self, index: usize, image: &Value) -> (Value, Value) {
        let line_num = index + 1;
        let mut regeneration_count = 0u32;

        loop {
            let mut video = self.generate_scene_video(index, image).await;
            if !video.get("success").and_then(Value::as_bool).unwrap_or(false) {
                return (video, json!({"line_num": line_num, "skipped": true}));
            }
            if !self.enable_qc {
                video["regeneration_count"] = json!(regeneration_count);
                return (video, json!({"line_num": line_num, "skipped": true}));
            }

            self.progress
                .emit("품질 검사", format!("장면 {line_num}"));
            let reference = self.reference_b64.clone().unwrap_or_default();
            let video_path = video
                .get("video_path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let qc = match self
                .qc
                .check_video(&reference, std::path::Path::new(&video_path), QC_FRAMES)
                .await
            {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(line_num, error = %e, "qc failed, accepting video");
                    video["qc_verdict"] = json!("N/A");
                    video["regeneration_count"] = json!(regeneration_count);
                    return (
                        video,
                        json!({"line_num": line_num, "error": e.to_string()}),
                    );
                }
            };

            if qc.verdict == Verdict::Fail && regeneration_count < self.max_regenerations {
                regeneration_count += 1;
                self.progress.emit(
                    "재생성",
                    format!("장면 {line_num} (QC 실패, {regeneration_count}차)"),
                );
                continue;
            }

            video["qc_verdict"] = json!(qc.verdict.as_str());
            video["qc_score"] = json!(qc.score);
            video["regeneration_count"] = json!(regeneration_count);
            let qc_record = json!({
                "line_num": line_num,
                "verdict": qc.verdict.as_str(),
                "score": qc.score,
                "regeneration_count": regeneration_count,
            });
            return (video, qc_record);
        }
    }

    async fn run_generation(&mut self) -> AgentResult {
        self.status = AgentStatus::Running;
        self.images.clear();
        self.videos.clear();
        self.qc_results.clear();

        for index in 0..self.prompts.len() {
            let image = self.generate_scene_image(index).await;
            let image_ok = image
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if index == 0 && !image_ok {
                // Without a reference every later scene would drift; stop here.
                self.status = AgentStatus::WaitingFeedback;
                return AgentResult::failed(
                    "image_generate",
                    "레퍼런스 이미지 생성에 실패했습니다. \"다시\"를 입력하면 재시도합니다.",
                )
                .awaiting_feedback();
            }

            if self.generate_videos && image_ok {
                let (video, qc) = self.generate_video_with_qc(index, &image).await;
                self.videos.push(video);
                self.qc_results.push(qc);
            }
            self.images.push(image);
        }

        self.phase = Phase::Review;
        self.status = AgentStatus::WaitingFeedback;
        AgentResult::ok("image_generate_review", self.format_results())
            .with_data("images", Value::Array(self.images.clone()))
            .with_data("videos", Value::Array(self.videos.clone()))
            .with_data("qc_results", Value::Array(self.qc_results.clone()))
            .awaiting_feedback()
    }

    async fn regenerate_scene(&mut self, line_num: usize) -> AgentResult {
        if line_num == 0 || line_num > self.prompts.len() {
            return AgentResult::ok(
                "image_generate_review",
                format!("장면 번호는 1~{} 사이여야 합니다.", self.prompts.len()),
            )
            .awaiting_feedback();
        }
        let index = line_num - 1;
        self.progress.emit("장면 재생성", format!("장면 {line_num}"));

        let image = self.generate_scene_image(index).await;
        let image_ok = image
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if self.generate_videos && image_ok {
            let (video, qc) = self.generate_video_with_qc(index, &image).await;
            if index < self.videos.len() {
                self.videos[index] = video;
                self.qc_results[index] = qc;
            } else {
                self.videos.push(video);
                self.qc_results.push(qc);
            }
        }
        if index < self.images.len() {
            self.images[index] = image;
        } else {
            self.images.push(image);
        }

        AgentResult::ok("image_generate_review", self.format_results())
            .with_data("images", Value::Array(self.images.clone()))
            .with_data("videos", Value::Array(self.videos.clone()))
            .with_data("qc_results", Value::Array(self.qc_results.clone()))
            .awaiting_feedback()
    }

    fn format_results(&self) -> String {
        let image_ok = self
            .images
            .iter()
            .filter(|i| i.get("success").and_then(Value::as_bool).unwrap_or(false))
            .count();
        let video_ok = self
            .videos
            .iter()
            .filter(|v| v.get("success").and_then(Value::as_bool).unwrap_or(false))
            .count();

        let mut out = format!(
            "# 생성 완료\n\n**이미지:** {image_ok}/{}개 성공\n",
            self.prompts.len()
        );
        if self.generate_videos {
            out.push_str(&format!("**영상:** {video_ok}/{}개 성공\n", self.prompts.len()));
        }
        for video in &self.videos {
            let n = video.get("line_num").and_then(Value::as_u64).unwrap_or(0);
            if let Some(verdict) = video.get("qc_verdict").and_then(Value::as_str) {
                let regen = video
                    .get("regeneration_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                out.push_str(&format!("- 장면 {n}: QC {verdict} (재생성 {regen}회)\n"));
            }
        }
        out.push_str("\n**확인**을 입력하면 완료, \"N번 다시\"로 특정 장면을 재생성합니다.");
        out
    }
}

#[async_trait]
impl Agent for ImageGeneratorAgent {
    fn name(&self) -> &str {
        "image_generator"
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError> {
        self.session_id = input
            .get_str(keys::SESSION_ID)
            .unwrap_or("default")
            .to_string();
        self.prompts = match input.get_array("prompts") {
            Some(list) if !list.is_empty() => list.clone(),
            _ => input.image_prompt_list(),
        };
        self.generate_videos = input.get_bool("generate_videos").unwrap_or(true);
        self.enable_qc = input.get_bool("enable_qc").unwrap_or(true);
        self.max_regenerations = input
            .get_u64("max_regenerations")
            .map(|n| n as u32)
            .unwrap_or(DEFAULT_MAX_REGENERATIONS);

        if self.prompts.is_empty() {
            self.phase = Phase::Ready;
            self.status = AgentStatus::WaitingFeedback;
            return Ok(AgentResult::ok(
                "image_generate",
                "**이미지/영상 생성**\n\n프롬프트가 없습니다. 먼저 이미지 프롬프트를 생성해주세요.",
            )
            .awaiting_feedback());
        }

        Ok(self.run_generation().await)
    }

    async fn handle_feedback(
        &mut self,
        feedback: &str,
        _images: &[String],
    ) -> Result<AgentResult, StudioError> {
        if intent::is_skip(feedback) {
            self.status = AgentStatus::Completed;
            return Ok(AgentResult::skipped("image_generate_skipped"));
        }

        let result = match self.phase {
            Phase::Ready => AgentResult::ok(
                "image_generate",
                "프롬프트가 없어 생성을 시작할 수 없습니다. \"스킵\"으로 건너뛸 수 있습니다.",
            )
            .awaiting_feedback(),
            Phase::Review => {
                if intent::is_confirmation(feedback) {
                    self.phase = Phase::Done;
                    self.status = AgentStatus::Completed;
                    AgentResult::ok("image_generate_done", "이미지/영상이 확정되었습니다!")
                        .with_data("images", Value::Array(self.images.clone()))
                        .with_data("videos", Value::Array(self.videos.clone()))
                        .with_data("qc_results", Value::Array(self.qc_results.clone()))
                } else if feedback.contains("다시") {
                    match intent::extract_selection(feedback) {
                        Some(n) => self.regenerate_scene(n).await,
                        None => self.run_generation().await,
                    }
                } else {
                    AgentResult::ok(
                        "image_generate_review",
                        "**확인** 또는 \"N번 다시\"를 입력해주세요.",
                    )
                    .awaiting_feedback()
                }
            }
            Phase::Done => AgentResult::ok("image_generate_done", "이미 확정되었습니다.")
                .with_data("images", Value::Array(self.images.clone()))
                .with_data("videos", Value::Array(self.videos.clone())),
        };
        Ok(result)
    }
}
