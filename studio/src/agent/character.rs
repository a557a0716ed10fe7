//! Character agent: CONCEPT → GENERATION.
//!
//! A reference image is style-analyzed by the vision adapter and drives an
//! adapter style-transfer workflow; a text description builds a prompt and
//! runs the base text-to-image workflow. Inside GENERATION, feedback is
//! classified against keyword tables into an edit type with its own denoise
//! preset, routed to a background-removal or image-edit workflow; plain
//! refinement rebuilds the prompt and re-runs the base generation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use super::{intent, Agent, AgentResult, AgentStatus};
use crate::adapters::{ArtStyle, ChatOptions, Llm, Vision, WorkflowEngine};
use crate::context::{keys, SessionContext};
use crate::error::StudioError;
use crate::message::strip_data_url;
use crate::progress::ProgressHandle;
use crate::workflows;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(180);

/// Edit request categories with their denoise presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditType {
    BackgroundRemoval,
    RemoveItem,
    HairChange,
    FaceEdit,
    GeneralEdit,
}

impl EditType {
    /// Denoise strength for the edit workflow, all within [0.60, 0.75].
    pub fn denoise(&self) -> f64 {
        match self {
            EditType::RemoveItem => 0.65,
            EditType::HairChange => 0.75,
            EditType::FaceEdit => 0.60,
            EditType::GeneralEdit | EditType::BackgroundRemoval => 0.70,
        }
    }
}

const EDIT_KEYWORDS: &[(EditType, &[&str])] = &[
    (
        EditType::BackgroundRemoval,
        &[
            "배경 제거", "배경 없", "배경 삭제", "투명 배경", "투명하게",
            "remove background", "transparent", "no background", "배경 지워",
        ],
    ),
    (
        EditType::RemoveItem,
        &[
            "안경 제거", "안경 없", "안경 벗", "remove glasses", "no glasses",
            "모자 제거", "모자 없", "remove hat", "수염 제거", "수염 없",
            "귀걸이 제거", "목걸이 제거", "액세서리 제거",
        ],
    ),
    (
        EditType::HairChange,
        &[
            "대머리", "머리 없", "삭발", "bald", "머리 색", "머리 스타일",
            "hair color", "hairstyle", "금발", "은발", "흑발", "갈색 머리",
            "파란 머리", "분홍 머리",
        ],
    ),
    (
        EditType::FaceEdit,
        &[
            "표정", "눈 색", "피부", "얼굴", "expression", "eye color",
            "웃는", "화난", "슬픈", "smiling", "angry", "sad",
        ],
    ),
    (
        EditType::GeneralEdit,
        &["수정해", "바꿔줘", "변경해", "edit", "change", "modify"],
    ),
];

/// Classifies feedback into an edit type; `None` means "refine the prompt".
pub fn detect_edit_request(feedback: &str) -> Option<EditType> {
    let lower = feedback.to_lowercase();
    EDIT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(edit_type, _)| *edit_type)
}

/// Style detection from a plain text description.
fn detect_style_from_text(text: &str) -> ArtStyle {
    let lower = text.to_lowercase();
    if lower.contains("애니") || lower.contains("anime") {
        ArtStyle::Anime
    } else if lower.contains("실사") || lower.contains("realistic") || lower.contains("사진") {
        ArtStyle::Realistic
    } else if lower.contains("3d") || lower.contains("픽사") {
        ArtStyle::ThreeD
    } else if lower.contains("픽셀") || lower.contains("pixel") {
        ArtStyle::Pixel
    } else if lower.contains("일러스트") || lower.contains("illustration") {
        ArtStyle::Illustration
    } else {
        ArtStyle::Cartoon
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Concept,
    Generation,
}

pub struct CharacterAgent {
    llm: Arc<dyn Llm>,
    vision: Arc<dyn Vision>,
    engine: Arc<dyn WorkflowEngine>,
    engine_input_dir: Option<PathBuf>,
    progress: ProgressHandle,

    status: AgentStatus,
    phase: Phase,
    channel_name: String,
    concept: String,
    current_prompt: String,
    reference_image: Option<String>,
    detected_style: ArtStyle,
    generated_images: Vec<String>,
}

impl CharacterAgent {
    pub fn new(
        llm: Arc<dyn Llm>,
        vision: Arc<dyn Vision>,
        engine: Arc<dyn WorkflowEngine>,
        engine_input_dir: Option<PathBuf>,
        progress: ProgressHandle,
    ) -> Self {
        Self {
            llm,
            vision,
            engine,
            engine_input_dir,
            progress,
            status: AgentStatus::Idle,
            phase: Phase::Concept,
            channel_name: String::new(),
            concept: String::new(),
            current_prompt: String::new(),
            reference_image: None,
            detected_style: ArtStyle::Cartoon,
            generated_images: Vec::new(),
        }
    }

    async fn build_prompt(&mut self, concept: &str) -> String {
        let request = format!(
            "Write one English image-generation prompt for a YouTube channel mascot.\n\
Channel: {}\nConcept: {}\nStyle keywords: {}\n\
Full body shot head to toe, plain light background, single character.\n\
Return ONLY the prompt text.",
            self.channel_name,
            concept,
            self.detected_style.keywords()
        );
        match self
            .llm
            .generate(&request, ChatOptions::default().with_temperature(0.7))
            .await
        {
            Ok(text) => text.trim().trim_matches('"').to_string(),
            Err(e) => {
                warn!(error = %e, "prompt build failed, using concept directly");
                format!(
                    "{concept}, full body, single character, {}, plain background",
                    self.detected_style.keywords()
                )
            }
        }
    }

    async fn run_generation(&mut self, workflow: &crate::workflows::WorkflowSpec, label: &str) -> AgentResult {
        self.progress.emit("이미지 생성", label);
        match self.engine.execute(workflow, IMAGE_TIMEOUT).await {
            Ok(images) if !images.is_empty() => {
                self.generated_images = images.clone();
                self.phase = Phase::Generation;
                self.status = AgentStatus::WaitingFeedback;
                AgentResult::ok(
                    "character",
                    "캐릭터를 생성했어요!\n\n수정 요청을 입력하거나, 마음에 들면 \"확정\"을 입력해주세요.",
                )
                .with_images(images)
                .with_data("detected_style", json!(self.detected_style.as_str()))
                .awaiting_feedback()
            }
            Ok(_) => {
                self.status = AgentStatus::WaitingFeedback;
                AgentResult::failed("character", "이미지가 생성되지 않았습니다. 다시 시도해주세요.")
                    .awaiting_feedback()
            }
            Err(e) => {
                self.status = AgentStatus::WaitingFeedback;
                AgentResult::failed("character", format!("이미지 생성 실패: {e}\n\n다시 시도하시겠어요?"))
                    .with_data("error", json!(e.to_string()))
                    .awaiting_feedback()
            }
        }
    }

    async fn generate_base(&mut self) -> AgentResult {
        let workflow = workflows::text_to_image(&self.current_prompt, 1024, 1024, None);
        self.run_generation(&workflow, "기본 생성").await
    }

    /// Writes the reference into the engine's input dir so workflows can
    /// load it by name. `None` when the dir is not mounted or write fails.
    fn upload_reference(&self, reference_b64: &str) -> Option<String> {
        use base64::Engine as _;
        let input_dir = self.engine_input_dir.as_ref()?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(strip_data_url(reference_b64))
            .ok()?;
        let name = format!("studio_charref_{}.png", uuid::Uuid::new_v4());
        std::fs::create_dir_all(input_dir).ok()?;
        std::fs::write(input_dir.join(&name), bytes).ok()?;
        Some(name)
    }

    async fn generate_with_style(&mut self) -> AgentResult {
        let Some(reference) = self.reference_image.clone() else {
            return self.generate_base().await;
        };
        let weight = workflows::style_transfer_weight(self.detected_style);
        // Style transfer proper needs the reference in the engine's input
        // dir; without the mount the reference travels as an edit input.
        let workflow = match self.upload_reference(&reference) {
            Some(name) => {
                workflows::style_transfer(&self.current_prompt, &name, weight, None)
            }
            None => workflows::image_edit(
                strip_data_url(&reference),
                &self.current_prompt,
                weight.min(0.75),
                None,
            ),
        };
        self.run_generation(&workflow, "스타일 전이").await
    }

    async fn generate_edit_instruction(&self, edit_type: EditType, feedback: &str) -> String {
        let base = match edit_type {
            EditType::RemoveItem => "remove the specified item from the image",
            EditType::HairChange => "modify the hairstyle or hair color as specified",
            EditType::FaceEdit => "edit the facial features as specified",
            _ => "apply the requested modification",
        };
        let prompt = format!(
            "User request: {feedback}\nBase instruction: {base}\n\n\
Generate a concise English instruction for an image edit model.\n\
Return ONLY the instruction."
        );
        match self
            .llm
            .generate(&prompt, ChatOptions::default().with_temperature(0.3))
            .await
        {
            Ok(text) => text.trim().trim_matches('"').to_string(),
            Err(_) => format!("edit the image: {feedback}"),
        }
    }

    async fn handle_edit(&mut self, edit_type: EditType, feedback: &str) -> AgentResult {
        let Some(image) = self.generated_images.first().cloned() else {
            return AgentResult::ok("character", "먼저 캐릭터를 생성해주세요!")
                .awaiting_feedback();
        };
        let image = strip_data_url(&image).to_string();

        if edit_type == EditType::BackgroundRemoval {
            self.progress.emit("배경 제거", "");
            let workflow = workflows::remove_background(&image);
            let result = self.run_generation(&workflow, "배경 제거").await;
            return if result.success {
                result.with_data("background_removed", json!(true))
            } else {
                result
            };
        }

        let instruction = self.generate_edit_instruction(edit_type, feedback).await;
        self.progress.emit("이미지 편집", &instruction);
        let workflow = workflows::image_edit(&image, &instruction, edit_type.denoise(), None);
        let result = self.run_generation(&workflow, "편집").await;
        if result.success {
            result.with_data("edit_type", json!(format!("{edit_type:?}")))
        } else {
            result
        }
    }

    async fn handle_concept(&mut self, feedback: &str, images: &[String]) -> AgentResult {
        if let Some(reference) = images.first() {
            self.reference_image = Some(reference.clone());
            self.concept = if feedback.trim().is_empty() {
                "레퍼런스 스타일".into()
            } else {
                feedback.to_string()
            };
            self.progress.emit("스타일 분석", "레퍼런스 이미지");
            self.detected_style = match self
                .vision
                .analyze_style(strip_data_url(reference))
                .await
            {
                Ok(style) => style,
                Err(e) => {
                    warn!(error = %e, "style analysis failed, defaulting to cartoon");
                    ArtStyle::Cartoon
                }
            };
            self.current_prompt = self.build_prompt(&self.concept.clone()).await;
            return self.generate_with_style().await;
        }

        if feedback.trim().is_empty() {
            return AgentResult::ok(
                "character",
                "레퍼런스 이미지를 첨부하거나 캐릭터를 설명해주세요.",
            )
            .awaiting_feedback();
        }

        self.concept = feedback.to_string();
        self.detected_style = detect_style_from_text(feedback);
        self.current_prompt = self.build_prompt(&self.concept.clone()).await;
        self.generate_base().await
    }

    async fn handle_generation(&mut self, feedback: &str) -> AgentResult {
        // Plain refinement: fold the feedback into the prompt and rerun.
        let concept = format!("{} ({})", self.concept, feedback);
        self.current_prompt = self.build_prompt(&concept).await;
        if self.reference_image.is_some() {
            self.generate_with_style().await
        } else {
            self.generate_base().await
        }
    }
}

#[async_trait]
impl Agent for CharacterAgent {
    fn name(&self) -> &str {
        "character"
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError> {
        self.phase = Phase::Concept;
        self.status = AgentStatus::WaitingFeedback;
        self.channel_name = input
            .get_str(keys::SELECTED_CHANNEL_NAME)
            .unwrap_or_default()
            .to_string();

        Ok(AgentResult::ok(
            "character",
            format!(
                "채널 \"{}\"의 캐릭터를 만들어볼게요!\n\n\
**레퍼런스 이미지**가 있다면 첨부해주세요 (스타일 자동 분석)\n\
**텍스트로 설명**해주셔도 됩니다",
                self.channel_name
            ),
        )
        .with_data("phase", json!("concept"))
        .awaiting_feedback())
    }

    async fn handle_feedback(
        &mut self,
        feedback: &str,
        images: &[String],
    ) -> Result<AgentResult, StudioError> {
        if intent::is_skip(feedback) {
            self.status = AgentStatus::Completed;
            return Ok(AgentResult::skipped("character_skipped"));
        }

        if intent::is_confirmation(feedback) && self.phase == Phase::Generation {
            self.status = AgentStatus::Completed;
            let image = self.generated_images.first().cloned();
            let mut result = AgentResult::ok("character_confirmed", "캐릭터가 확정되었습니다!")
                .with_images(self.generated_images.clone())
                .with_data("detected_style", json!(self.detected_style.as_str()));
            if let Some(image) = image {
                result = result.with_data(keys::CHARACTER_IMAGE, Value::String(image));
            }
            return Ok(result);
        }

        if let Some(edit_type) = detect_edit_request(feedback) {
            if !self.generated_images.is_empty() {
                return Ok(self.handle_edit(edit_type, feedback).await);
            }
        }

        let result = match self.phase {
            Phase::Concept => self.handle_concept(feedback, images).await,
            Phase::Generation => self.handle_generation(feedback).await,
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_detection_routes_by_keyword_table() {
        assert_eq!(
            detect_edit_request("배경 제거해줘"),
            Some(EditType::BackgroundRemoval)
        );
        assert_eq!(detect_edit_request("안경 제거"), Some(EditType::RemoveItem));
        assert_eq!(detect_edit_request("금발로 해줘"), Some(EditType::HairChange));
        assert_eq!(detect_edit_request("웃는 얼굴로"), Some(EditType::FaceEdit));
        assert_eq!(detect_edit_request("좀 바꿔줘"), Some(EditType::GeneralEdit));
        assert_eq!(detect_edit_request("멋지다"), None);
    }

    #[test]
    fn denoise_presets_stay_in_range() {
        for edit in [
            EditType::BackgroundRemoval,
            EditType::RemoveItem,
            EditType::HairChange,
            EditType::FaceEdit,
            EditType::GeneralEdit,
        ] {
            let d = edit.denoise();
            assert!((0.60..=0.75).contains(&d), "{edit:?}: {d}");
        }
    }

    #[test]
    fn text_style_detection() {
        assert_eq!(detect_style_from_text("애니메이션풍"), ArtStyle::Anime);
        assert_eq!(detect_style_from_text("실사 느낌"), ArtStyle::Realistic);
        assert_eq!(detect_style_from_text("픽사같은 3d"), ArtStyle::ThreeD);
        assert_eq!(detect_style_from_text("귀여운 곰"), ArtStyle::Cartoon);
    }
}
