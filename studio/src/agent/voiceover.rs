//! Voiceover agent: preset speaker or cloned voice, one synthesis per
//! script section.
//!
//! Phases: ASK_OPTION → (ASK_CLONE_TYPE → ASK_YOUTUBE_INFO |
//! ASK_SAMPLE_SELECT) → GENERATING → CONFIRM. Cloning references come from
//! a YouTube segment (`MM:SS-MM:SS` window) or a precomputed sample list;
//! successful sections are persisted to the session's voiceover directory.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::warn;

use super::{intent, Agent, AgentResult, AgentStatus};
use crate::adapters::TtsClient;
use crate::context::{keys, SessionContext};
use crate::error::StudioError;
use crate::paths::PathPolicy;
use crate::progress::ProgressHandle;
use crate::youtube::YouTubeService;

const LANGUAGE: &str = "Korean";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    AskOption,
    AskCloneType,
    AskYoutubeUrl,
    AskYoutubeTime,
    AskSampleSelect,
    Generating,
    Confirm,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum VoiceOption {
    Default,
    Youtube,
    Sample,
}

/// One entry of the precomputed sample library.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct VoiceSample {
    pub filename: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub label: String,
}

/// Script sections in narration order.
pub fn extract_sections(script: &Value) -> Vec<(String, String)> {
    const SECTIONS: &[(&str, &str)] = &[
        ("opening", "오프닝"),
        ("intro", "인트로"),
        ("body1", "본론1"),
        ("body2", "본론2"),
        ("body3", "본론3"),
        ("conclusion", "결론"),
    ];
    match script {
        Value::Object(map) => SECTIONS
            .iter()
            .filter_map(|(key, name)| {
                map.get(*key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| t.chars().count() > 10)
                    .map(|t| (name.to_string(), t.to_string()))
            })
            .collect(),
        Value::String(s) if s.trim().chars().count() > 10 => {
            vec![("전체".to_string(), s.trim().to_string())]
        }
        _ => Vec::new(),
    }
}

/// Parses a `MM:SS-MM:SS` (or `SS-SS`) clone window.
pub fn parse_time_window(text: &str) -> Option<(String, String)> {
    let (start, end) = text.trim().split_once('-')?;
    let start = start.trim();
    let end = end.trim();
    crate::youtube::parse_clock_time(start)?;
    crate::youtube::parse_clock_time(end)?;
    Some((start.to_string(), end.to_string()))
}

pub struct VoiceoverAgent {
    tts: Arc<dyn TtsClient>,
    youtube: Arc<YouTubeService>,
    paths: Arc<PathPolicy>,
    progress: ProgressHandle,
    default_speaker: String,

    status: AgentStatus,
    phase: Phase,
    session_id: String,
    script: Value,
    voice_option: VoiceOption,
    youtube_url: Option<String>,
    youtube_window: Option<(String, String)>,
    samples: Vec<VoiceSample>,
    selected_sample: Option<VoiceSample>,
    sections_result: Vec<Value>,
}

impl VoiceoverAgent {
    pub fn new(
        tts: Arc<dyn TtsClient>,
        youtube: Arc<YouTubeService>,
        paths: Arc<PathPolicy>,
        progress: ProgressHandle,
        default_speaker: impl Into<String>,
    ) -> Self {
        Self {
            tts,
            youtube,
            paths,
            progress,
            default_speaker: default_speaker.into(),
            status: AgentStatus::Idle,
            phase: Phase::AskOption,
            session_id: String::new(),
            script: Value::Null,
            voice_option: VoiceOption::Default,
            youtube_url: None,
            youtube_window: None,
            samples: Vec::new(),
            selected_sample: None,
            sections_result: Vec::new(),
        }
    }

    fn load_samples(&self) -> Vec<VoiceSample> {
        let path = self.paths.voice_samples_index();
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("prompts").cloned())
            .and_then(|v| serde_json::from_value::<Vec<VoiceSample>>(v).ok())
            .map(|mut samples| {
                samples.truncate(20);
                samples
            })
            .unwrap_or_default()
    }

    /// Prepares the cloning reference: `(audio_b64, transcript)`.
    async fn clone_reference(&self) -> Result<(String, Option<String>), String> {
        match self.voice_option {
            VoiceOption::Youtube => {
                let (url, (start, end)) = match (&self.youtube_url, &self.youtube_window) {
                    (Some(u), Some(w)) => (u.clone(), w.clone()),
                    _ => return Err("YouTube 정보가 없습니다.".into()),
                };
                self.progress.emit("보이스오버", "YouTube에서 음성 추출 중");
                let audio = self
                    .youtube
                    .extract_audio_segment(&url, &start, &end)
                    .await
                    .map_err(|e| format!("YouTube 음성 추출 실패: {e}"))?;
                let transcript = self
                    .youtube
                    .transcript_segment(&url, &start, &end)
                    .await
                    .unwrap_or(None);
                Ok((
                    base64::engine::general_purpose::STANDARD.encode(audio),
                    transcript,
                ))
            }
            VoiceOption::Sample => {
                let sample = self
                    .selected_sample
                    .as_ref()
                    .ok_or("샘플이 선택되지 않았습니다.")?;
                let path = self.paths.voice_samples_dir().join(&sample.filename);
                let bytes = std::fs::read(&path)
                    .map_err(|_| format!("샘플 파일을 찾을 수 없습니다: {}", sample.filename))?;
                let text = (!sample.text.is_empty()).then(|| sample.text.clone());
                Ok((
                    base64::engine::general_purpose::STANDARD.encode(bytes),
                    text,
                ))
            }
            VoiceOption::Default => Err("기본 보이스는 레퍼런스가 필요 없습니다.".into()),
        }
    }

    async fn generate(&mut self) -> AgentResult {
        let sections = extract_sections(&self.script);
        if sections.is_empty() {
            self.status = AgentStatus::WaitingFeedback;
            return AgentResult::failed(
                "voiceover",
                "대본에서 텍스트를 추출할 수 없습니다.",
            )
            .awaiting_feedback();
        }

        let reference = if self.voice_option != VoiceOption::Default {
            match self.clone_reference().await {
                Ok(r) => Some(r),
                Err(msg) => {
                    self.status = AgentStatus::WaitingFeedback;
                    return AgentResult::failed("voiceover", msg).awaiting_feedback();
                }
            }
        } else {
            None
        };

        let out_dir = self.paths.voiceover_dir(&self.session_id);
        if let Err(e) = std::fs::create_dir_all(&out_dir) {
            self.status = AgentStatus::WaitingFeedback;
            return AgentResult::failed("voiceover", format!("출력 디렉토리 생성 실패: {e}"))
                .awaiting_feedback();
        }

        let total = sections.len();
        self.progress
            .emit("보이스오버 생성", format!("총 {total}개 섹션"));

        let mut results = Vec::with_capacity(total);
        for (i, (name, text)) in sections.iter().enumerate() {
            self.progress
                .emit("보이스오버 생성", format!("[{}/{total}] {name}", i + 1));
            let audio = match &reference {
                Some((ref_b64, ref_text)) => {
                    self.tts
                        .synthesize_clone(text, ref_b64, ref_text.as_deref())
                        .await
                }
                None => {
                    self.tts
                        .synthesize_preset(text, &self.default_speaker, LANGUAGE)
                        .await
                }
            };
            match audio {
                Ok(bytes) => {
                    let filename = format!("{}_{}_{name}.wav", self.session_id, i + 1);
                    let filepath = out_dir.join(&filename);
                    match std::fs::write(&filepath, &bytes) {
                        Ok(()) => results.push(json!({
                            "section": name,
                            "filename": filename,
                            "filepath": filepath.display().to_string(),
                            "success": true,
                        })),
                        Err(e) => results.push(json!({"section": name, "error": e.to_string()})),
                    }
                }
                Err(e) => {
                    warn!(section = %name, error = %e, "tts failed");
                    results.push(json!({"section": name, "error": e.to_string()}));
                }
            }
        }

        let success_count = results
            .iter()
            .filter(|r| r.get("success").and_then(Value::as_bool).unwrap_or(false))
            .count();
        let voice_type = match self.voice_option {
            VoiceOption::Default => format!("기본 보이스 ({})", self.default_speaker),
            VoiceOption::Youtube => "YouTube 클로닝".into(),
            VoiceOption::Sample => "샘플 클로닝".into(),
        };

        self.sections_result = results.clone();
        self.phase = Phase::Confirm;
        self.status = AgentStatus::WaitingFeedback;

        AgentResult::ok(
            "voiceover_done",
            format!(
                "보이스오버 생성이 완료되었습니다!\n\n**음성 타입:** {voice_type}\n\
**생성 결과:** {success_count}/{total} 섹션 성공\n\n\
확정을 입력하면 완료됩니다. 다시를 입력하면 재생성합니다."
            ),
        )
        .with_data("sections", Value::Array(results))
        .with_data("success_count", json!(success_count))
        .with_data("total_count", json!(total))
        .awaiting_feedback()
    }

    fn option_message(&self) -> AgentResult {
        AgentResult::ok(
            "voiceover_option",
            format!(
                "AI 보이스오버를 생성할 준비가 되었습니다!\n\n\
**음성 옵션을 선택해주세요:**\n\n\
**1. 기본 보이스 ({})**\n   바로 생성 가능\n\n\
**2. 보이스 클로닝**\n   YouTube 영상 또는 저장된 샘플 사용\n\n\
번호를 입력해주세요. (1 또는 2)",
                self.default_speaker
            ),
        )
        .with_data(
            "options",
            json!([
                {"id": 1, "label": format!("기본 보이스 ({})", self.default_speaker)},
                {"id": 2, "label": "보이스 클로닝"}
            ]),
        )
        .awaiting_feedback()
    }
}

#[async_trait]
impl Agent for VoiceoverAgent {
    fn name(&self) -> &str {
        "voiceover"
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError> {
        self.session_id = input
            .get_str(keys::SESSION_ID)
            .unwrap_or("default")
            .to_string();
        self.script = input.get(keys::SCRIPT).cloned().unwrap_or(Value::Null);

        if extract_sections(&self.script).is_empty() {
            return Ok(AgentResult::failed(
                "voiceover",
                "대본이 없습니다. 먼저 대본을 작성해주세요.",
            ));
        }

        // TTS settings chosen earlier in the workflow pre-seed the option.
        match input.get_str(keys::TTS_VOICE_OPTION) {
            Some("default") => {
                self.voice_option = VoiceOption::Default;
                self.phase = Phase::Generating;
                self.status = AgentStatus::WaitingFeedback;
                return Ok(AgentResult::ok(
                    "voiceover_ready",
                    format!(
                        "기본 보이스({})로 생성합니다.\n\n\"생성\"을 입력하면 시작합니다.",
                        self.default_speaker
                    ),
                )
                .awaiting_feedback());
            }
            Some("youtube") => {
                self.voice_option = VoiceOption::Youtube;
                self.youtube_url = input
                    .get_str(keys::TTS_YOUTUBE_URL)
                    .map(str::to_string);
                self.youtube_window = input
                    .get_str(keys::TTS_YOUTUBE_TIME)
                    .and_then(parse_time_window);
                if self.youtube_url.is_some() && self.youtube_window.is_some() {
                    self.phase = Phase::Generating;
                    self.status = AgentStatus::WaitingFeedback;
                    return Ok(AgentResult::ok(
                        "voiceover_ready",
                        "YouTube 클로닝 설정이 확인되었습니다.\n\n\"생성\"을 입력하면 시작합니다.",
                    )
                    .awaiting_feedback());
                }
            }
            Some("sample") => {
                self.voice_option = VoiceOption::Sample;
                self.samples = self.load_samples();
                if let Some(idx) = input.get_u64(keys::TTS_SAMPLE_IDX) {
                    self.selected_sample = self.samples.get(idx as usize).cloned();
                }
                if self.selected_sample.is_some() {
                    self.phase = Phase::Generating;
                    self.status = AgentStatus::WaitingFeedback;
                    return Ok(AgentResult::ok(
                        "voiceover_ready",
                        "샘플 보이스 설정이 확인되었습니다.\n\n\"생성\"을 입력하면 시작합니다.",
                    )
                    .awaiting_feedback());
                }
            }
            _ => {}
        }

        self.phase = Phase::AskOption;
        self.status = AgentStatus::WaitingFeedback;
        Ok(self.option_message())
    }

    async fn handle_feedback(
        &mut self,
        feedback: &str,
        _images: &[String],
    ) -> Result<AgentResult, StudioError> {
        if intent::is_skip(feedback) {
            self.status = AgentStatus::Completed;
            return Ok(AgentResult::skipped("voiceover_skipped"));
        }

        let lower = feedback.to_lowercase();
        let result = match self.phase {
            Phase::AskOption => {
                if lower.contains('1') || lower.contains("기본") || lower.contains("default") {
                    self.voice_option = VoiceOption::Default;
                    self.phase = Phase::Generating;
                    AgentResult::ok(
                        "voiceover_ready",
                        format!(
                            "기본 보이스({})로 생성합니다.\n\n\"생성\"을 입력하면 시작합니다.",
                            self.default_speaker
                        ),
                    )
                    .awaiting_feedback()
                } else if lower.contains('2')
                    || lower.contains("클로닝")
                    || lower.contains("clone")
                {
                    self.phase = Phase::AskCloneType;
                    AgentResult::ok(
                        "voiceover_clone_type",
                        "**보이스 클로닝 방식을 선택해주세요:**\n\n\
1. YouTube 영상에서 추출\n2. 저장된 샘플 사용\n\n번호를 입력해주세요. (1 또는 2)",
                    )
                    .awaiting_feedback()
                } else {
                    self.option_message()
                }
            }
            Phase::AskCloneType => {
                if lower.contains('1') || lower.contains("youtube") {
                    self.voice_option = VoiceOption::Youtube;
                    self.phase = Phase::AskYoutubeUrl;
                    AgentResult::ok(
                        "voiceover_youtube",
                        "복제할 목소리가 있는 YouTube 영상 URL을 입력해주세요.",
                    )
                    .awaiting_feedback()
                } else if lower.contains('2') || lower.contains("샘플") || lower.contains("sample")
                {
                    self.voice_option = VoiceOption::Sample;
                    self.samples = self.load_samples();
                    if self.samples.is_empty() {
                        self.phase = Phase::AskOption;
                        AgentResult::ok(
                            "voiceover_option",
                            "저장된 샘플이 없습니다. 기본 보이스를 사용하려면 \"1\"을 입력해주세요.",
                        )
                        .awaiting_feedback()
                    } else {
                        self.phase = Phase::AskSampleSelect;
                        let listing: String = self
                            .samples
                            .iter()
                            .enumerate()
                            .map(|(i, s)| {
                                let label =
                                    if s.label.is_empty() { &s.filename } else { &s.label };
                                format!("{}. {label}", i + 1)
                            })
                            .collect::<Vec<_>>()
                            .join("\n");
                        AgentResult::ok(
                            "voiceover_sample",
                            format!("저장된 샘플 목록:\n{listing}\n\n번호를 입력해주세요."),
                        )
                        .awaiting_feedback()
                    }
                } else {
                    AgentResult::ok("voiceover_clone_type", "1 또는 2를 입력해주세요.")
                        .awaiting_feedback()
                }
            }
            Phase::AskYoutubeUrl => {
                if feedback.contains("youtube.com") || feedback.contains("youtu.be") {
                    self.youtube_url = Some(feedback.trim().to_string());
                    self.phase = Phase::AskYoutubeTime;
                    AgentResult::ok(
                        "voiceover_youtube",
                        "음성을 추출할 시간대를 입력해주세요.\n예: 0:30-0:45 (30초~45초 구간)",
                    )
                    .awaiting_feedback()
                } else {
                    AgentResult::ok(
                        "voiceover_youtube",
                        "올바른 YouTube URL을 입력해주세요.\n예: https://youtube.com/watch?v=...",
                    )
                    .awaiting_feedback()
                }
            }
            Phase::AskYoutubeTime => match parse_time_window(feedback) {
                Some(window) => {
                    self.youtube_window = Some(window);
                    self.phase = Phase::Generating;
                    AgentResult::ok(
                        "voiceover_ready",
                        "시간대가 저장되었습니다.\n\n\"생성\"을 입력하면 보이스오버 생성을 시작합니다.",
                    )
                    .awaiting_feedback()
                }
                None => AgentResult::ok(
                    "voiceover_youtube",
                    "시간대 형식이 올바르지 않습니다. 예: 0:30-0:45",
                )
                .awaiting_feedback(),
            },
            Phase::AskSampleSelect => match intent::extract_selection(feedback) {
                Some(n) if n >= 1 && n <= self.samples.len() => {
                    self.selected_sample = Some(self.samples[n - 1].clone());
                    self.phase = Phase::Generating;
                    AgentResult::ok(
                        "voiceover_ready",
                        "샘플이 선택되었습니다.\n\n\"생성\"을 입력하면 시작합니다.",
                    )
                    .awaiting_feedback()
                }
                _ => AgentResult::ok("voiceover_sample", "올바른 번호를 입력해주세요.")
                    .awaiting_feedback(),
            },
            Phase::Generating => self.generate().await,
            Phase::Confirm => {
                if intent::is_confirmation(feedback) {
                    self.status = AgentStatus::Completed;
                    AgentResult::ok(
                        "voiceover_confirmed",
                        "보이스오버가 확정되었습니다!",
                    )
                    .with_data("sections", Value::Array(self.sections_result.clone()))
                } else if feedback.contains("다시") || feedback.contains("재생성") {
                    self.generate().await
                } else {
                    AgentResult::ok("voiceover_confirm", "확정을 입력하면 완료됩니다.")
                        .awaiting_feedback()
                }
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sections_come_out_in_narration_order() {
        let script = json!({
            "conclusion": "마무리 멘트가 충분히 길어야 합니다.",
            "opening": "시작 멘트도 충분히 길어야 합니다.",
            "body2": "짧음",
        });
        let sections = extract_sections(&script);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "오프닝");
        assert_eq!(sections[1].0, "결론");
    }

    #[test]
    fn string_script_becomes_single_section() {
        let script = json!("이것은 통짜 대본 텍스트입니다. 충분히 깁니다.");
        let sections = extract_sections(&script);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, "전체");
    }

    #[test]
    fn time_window_parses_mm_ss_ranges() {
        assert_eq!(
            parse_time_window("0:30-0:45"),
            Some(("0:30".into(), "0:45".into()))
        );
        assert_eq!(parse_time_window("10-25"), Some(("10".into(), "25".into())));
        assert_eq!(parse_time_window("nonsense"), None);
    }
}
