//! Benchmarker agent: multi-step analysis of one or more reference
//! channels.
//!
//! Phases: ASK (URL intake, cache consult) → CONFIRM (channel identity) →
//! COLLECT (more channels or start) → ANALYZE → REPORT. Collection pulls
//! recent videos, transcripts, thumbnails and channel screenshots; analysis
//! runs five sub-analyses plus a six-section replication guide, each
//! isolating its own failure with a `(분석 실패: …)` marker so the overall
//! stage still succeeds. Finished reports are persisted to the benchmark
//! cache keyed by the analyzed URLs.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::warn;

use super::{intent, Agent, AgentResult, AgentStatus};
use crate::adapters::{ChatOptions, Llm, Vision};
use crate::benchmark::{
    AudienceProfile, BenchmarkCache, BenchmarkReport, CacheEntry, ChannelMetadata,
    ContentStrategy, ScriptPattern, ThumbnailPattern, VideoMetadata,
};
use crate::context::SessionContext;
use crate::error::StudioError;
use crate::json_extract::extract_object;
use crate::progress::ProgressHandle;
use crate::prompts::{render, PromptSet};
use crate::screenshot::{CaptureOptions, ChannelCapture, ChannelShots};
use crate::youtube::YouTubeService;

const MAX_CHANNELS: usize = 3;
const MAX_VIDEOS: usize = 20;
const MAX_TRANSCRIPTS: usize = 5;
const TRANSCRIPT_CHAR_CAP: usize = 5000;
const MAX_THUMBNAILS: usize = 8;

static URL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(https?://)?(?:www\.)?youtube\.com/@[^\s]+",
        r"(https?://)?(?:www\.)?youtube\.com/channel/[^\s]+",
        r"(https?://)?(?:www\.)?youtube\.com/c/[^\s]+",
        r"(https?://)?(?:www\.)?youtube\.com/user/[^\s]+",
        r"(https?://)?(?:www\.)?youtube\.com/watch\?v=[^\s]+",
        r"(https?://)?youtu\.be/[^\s]+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// First YouTube URL found in free text, scheme added when missing.
pub fn extract_youtube_url(text: &str) -> Option<String> {
    for re in URL_RES.iter() {
        if let Some(m) = re.find(text) {
            let url = m.as_str();
            return Some(if url.starts_with("http") {
                url.to_string()
            } else {
                format!("https://{url}")
            });
        }
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Ask,
    Confirm,
    Collect,
    Analyze,
    Report,
}

/// Everything collected for one channel before analysis.
struct ChannelData {
    url: String,
    meta: ChannelMetadata,
    videos: Vec<VideoMetadata>,
    transcripts: Vec<String>,
    thumbs_b64: Vec<String>,
    shots: ChannelShots,
}

pub struct BenchmarkerAgent {
    llm: Arc<dyn Llm>,
    vision: Arc<dyn Vision>,
    youtube: Arc<YouTubeService>,
    capture: Arc<dyn ChannelCapture>,
    cache: Arc<BenchmarkCache>,
    prompts: Arc<PromptSet>,
    progress: ProgressHandle,

    status: AgentStatus,
    phase: Phase,
    pending_url: Option<String>,
    pending_channel: Option<ChannelMetadata>,
    confirmed_urls: Vec<String>,
    cached: Option<CacheEntry>,
    report: Option<BenchmarkReport>,
}

impl BenchmarkerAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn Llm>,
        vision: Arc<dyn Vision>,
        youtube: Arc<YouTubeService>,
        capture: Arc<dyn ChannelCapture>,
        cache: Arc<BenchmarkCache>,
        prompts: Arc<PromptSet>,
        progress: ProgressHandle,
    ) -> Self {
        Self {
            llm,
            vision,
            youtube,
            capture,
            cache,
            prompts,
            progress,
            status: AgentStatus::Idle,
            phase: Phase::Ask,
            pending_url: None,
            pending_channel: None,
            confirmed_urls: Vec::new(),
            cached: None,
            report: None,
        }
    }

    fn ask_again(&self, message: impl Into<String>) -> AgentResult {
        AgentResult::ok("benchmark_ask", message).awaiting_feedback()
    }

    async fn handle_ask(&mut self, feedback: &str) -> AgentResult {
        let Some(url) = extract_youtube_url(feedback) else {
            return self.ask_again(
                "YouTube 채널 URL을 입력해주세요.\n예: youtube.com/@채널명\n\n벤치마킹 없이 진행하려면 \"스킵\"을 입력하세요.",
            );
        };

        self.progress.emit("캐시 확인", &url);
        if let Some(cached) = self.cache.find(&url) {
            let summary = BenchmarkCache::summary(&cached);
            self.cached = Some(cached.clone());
            self.pending_url = Some(url);
            self.phase = Phase::Report;
            self.status = AgentStatus::WaitingFeedback;
            return AgentResult::ok("benchmark_cached", summary)
                .with_data("cached", json!(true))
                .with_data("report", cached.report.to_value())
                .awaiting_feedback();
        }

        self.progress.emit("채널 확인", &url);
        match self.youtube.channel_info(&url).await {
            Ok(Some(info)) => {
                self.pending_url = Some(url.clone());
                self.pending_channel = Some(info.clone());
                self.phase = Phase::Confirm;
                self.status = AgentStatus::WaitingFeedback;

                let subs = if info.subscriber_count > 0 {
                    format!("{}", info.subscriber_count)
                } else {
                    "비공개".into()
                };
                let desc: String = info.description.chars().take(150).collect();
                AgentResult::ok(
                    "benchmark_confirm",
                    format!(
                        "**{}**\n\n구독자: **{subs}명**\n\n영상 수: **{}개**\n\n설명: {desc}\n\n\
이 채널이 맞나요?\n- 맞으면 **확인**\n- 다른 채널이면 URL을 다시 입력해주세요",
                        info.channel_name, info.video_count
                    ),
                )
                .with_data(
                    "channel_preview",
                    json!({
                        "url": url,
                        "name": info.channel_name,
                        "subscribers": info.subscriber_count,
                        "videos": info.video_count,
                    }),
                )
                .awaiting_feedback()
            }
            Ok(None) => self.ask_again(format!(
                "채널 정보를 가져올 수 없습니다.\nURL을 확인해주세요: {url}\n\n다른 URL을 입력하거나 \"스킵\"을 입력하세요."
            )),
            Err(e) => {
                warn!(error = %e, "channel info fetch failed");
                self.ask_again(
                    "채널 정보를 가져오는 중 오류가 발생했습니다.\n다른 URL을 입력하거나 \"스킵\"을 입력하세요.",
                )
                .with_data("error", json!(e.to_string()))
            }
        }
    }

    async fn handle_confirm(&mut self, feedback: &str) -> AgentResult {
        // A new URL replaces the pending channel.
        if extract_youtube_url(feedback).is_some() {
            return self.handle_ask(feedback).await;
        }

        if intent::is_confirmation(feedback) {
            if let Some(url) = self.pending_url.take() {
                self.confirmed_urls.push(url);
            }
            let channel_name = self
                .pending_channel
                .take()
                .map(|c| c.channel_name)
                .unwrap_or_else(|| "채널".into());

            if self.confirmed_urls.len() >= MAX_CHANNELS {
                return self.start_analysis().await;
            }
            self.phase = Phase::Collect;
            self.status = AgentStatus::WaitingFeedback;
            return AgentResult::ok(
                "benchmark_collect",
                format!(
                    "**{channel_name}** 채널이 추가되었습니다. (현재 {}개)\n\n\
더 분석할 채널이 있으면 URL을 입력해주세요.\n없으면 \"분석 시작\" 또는 \"시작\"을 입력하세요.",
                    self.confirmed_urls.len()
                ),
            )
            .awaiting_feedback();
        }

        self.phase = Phase::Ask;
        self.ask_again("다른 채널 URL을 입력해주세요.")
    }

    async fn handle_collect(&mut self, feedback: &str) -> AgentResult {
        if extract_youtube_url(feedback).is_some() {
            return self.handle_ask(feedback).await;
        }
        if feedback.contains("분석") || feedback.contains("시작") || intent::is_confirmation(feedback) {
            return self.start_analysis().await;
        }
        AgentResult::ok(
            "benchmark_collect",
            "URL을 입력하거나 \"분석 시작\"을 입력해주세요.",
        )
        .awaiting_feedback()
    }

    async fn handle_report(&mut self, feedback: &str) -> AgentResult {
        if intent::is_reanalyze(feedback) {
            let url = self
                .cached
                .as_ref()
                .and_then(|c| c.channel_urls.first().cloned())
                .or_else(|| self.pending_url.clone());
            let Some(url) = url else {
                self.phase = Phase::Ask;
                return self.ask_again("다시 분석할 채널 URL을 입력해주세요.");
            };
            self.cache.delete(&url);
            self.cached = None;
            self.report = None;
            self.confirmed_urls = vec![url.clone()];
            self.progress.emit("캐시 삭제", &url);
            return self.start_analysis().await;
        }

        if intent::is_confirmation(feedback) {
            let report = self
                .report
                .clone()
                .or_else(|| self.cached.as_ref().map(|c| c.report.clone()))
                .unwrap_or_default();
            self.status = AgentStatus::Completed;
            return AgentResult::ok(
                "benchmark_complete",
                "벤치마킹이 완료되었습니다! 다음 단계로 진행합니다.",
            )
            .with_data("report", report.to_value());
        }

        AgentResult::ok(
            "benchmark_report_hint",
            "리포트를 확인하셨으면 **확인**을, 새로 분석하려면 **다시 분석**을 입력하세요.",
        )
        .awaiting_feedback()
    }

    // ---- collection -----------------------------------------------------

    async fn collect_channel(&self, url: &str) -> Result<ChannelData, StudioError> {
        self.progress.emit("채널 수집", url);
        let meta = self
            .youtube
            .channel_info(url)
            .await?
            .ok_or_else(|| StudioError::UserInput(format!("채널을 찾을 수 없습니다: {url}")))?;

        let videos = self.youtube.channel_videos(url, MAX_VIDEOS).await?;
        self.progress
            .emit("영상 목록", format!("{}개 수집", videos.len()));

        let mut transcripts = Vec::new();
        for video in videos.iter() {
            if transcripts.len() >= MAX_TRANSCRIPTS {
                break;
            }
            let video_url = format!("https://youtube.com/watch?v={}", video.video_id);
            match self
                .youtube
                .video_transcript(&video_url, TRANSCRIPT_CHAR_CAP)
                .await
            {
                Ok(Some(text)) if !text.is_empty() => {
                    self.progress
                        .emit("자막 수집", format!("{}/{MAX_TRANSCRIPTS}", transcripts.len() + 1));
                    transcripts.push(text);
                }
                Ok(_) => {}
                Err(e) => warn!(video = %video.video_id, error = %e, "transcript fetch failed"),
            }
        }

        let mut thumbs_b64 = Vec::new();
        for video in videos.iter().take(MAX_THUMBNAILS) {
            if video.thumbnail_url.is_empty() {
                continue;
            }
            match self.youtube.download_thumbnail(&video.thumbnail_url).await {
                Ok(bytes) => {
                    use base64::Engine as _;
                    thumbs_b64
                        .push(base64::engine::general_purpose::STANDARD.encode(&bytes));
                }
                Err(e) => warn!(error = %e, "thumbnail download failed"),
            }
        }

        let shots = match self.capture.capture(url, &CaptureOptions::default()).await {
            Ok(shots) => {
                self.progress.emit("스크린샷", "채널 페이지 캡처 완료");
                shots
            }
            Err(e) => {
                warn!(error = %e, "channel capture unavailable");
                ChannelShots::default()
            }
        };

        Ok(ChannelData {
            url: url.to_string(),
            meta,
            videos,
            transcripts,
            thumbs_b64,
            shots,
        })
    }

    // ---- sub-analyses ---------------------------------------------------

    fn failed_summary(reason: impl std::fmt::Display) -> String {
        format!("(분석 실패: {reason})")
    }

    async fn analyze_thumbnails(&self, data: &ChannelData) -> ThumbnailPattern {
        self.progress.emit("썸네일 분석", &data.meta.channel_name);
        // Prefer the grid screenshot, fall back to the first thumbnail.
        let image = data
            .shots
            .videos_page_b64
            .as_deref()
            .or_else(|| data.thumbs_b64.first().map(String::as_str));
        let Some(image) = image else {
            return ThumbnailPattern {
                summary: Self::failed_summary("썸네일 이미지 없음"),
                ..Default::default()
            };
        };

        let answer = match self
            .vision
            .analyze_image(image, &self.prompts.thumbnail_analysis)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                return ThumbnailPattern {
                    summary: Self::failed_summary(e),
                    ..Default::default()
                }
            }
        };
        match extract_object(&answer)
            .and_then(|m| serde_json::from_value(Value::Object(m)).ok())
        {
            Some(pattern) => pattern,
            None => ThumbnailPattern {
                summary: Self::failed_summary("JSON 파싱 실패"),
                ..Default::default()
            },
        }
    }

    async fn analyze_scripts(&self, data: &ChannelData) -> ScriptPattern {
        self.progress.emit("대본 패턴 분석", &data.meta.channel_name);
        if data.transcripts.is_empty() {
            return ScriptPattern {
                summary: Self::failed_summary("자막 없음"),
                ..Default::default()
            };
        }
        let transcripts = data.transcripts.join("\n\n---\n\n");
        let prompt = render(
            &self.prompts.script_analysis,
            &[
                ("channel_name", data.meta.channel_name.as_str()),
                ("transcripts", transcripts.as_str()),
            ],
        );
        match self.llm.generate(&prompt, ChatOptions::default()).await {
            Ok(text) => extract_object(&text)
                .and_then(|m| serde_json::from_value(Value::Object(m)).ok())
                .unwrap_or_else(|| ScriptPattern {
                    summary: Self::failed_summary("JSON 파싱 실패"),
                    ..Default::default()
                }),
            Err(e) => ScriptPattern {
                summary: Self::failed_summary(e),
                ..Default::default()
            },
        }
    }

    async fn analyze_strategy(&self, data: &ChannelData) -> ContentStrategy {
        self.progress.emit("콘텐츠 전략 분석", &data.meta.channel_name);
        if data.videos.is_empty() {
            return ContentStrategy {
                summary: Self::failed_summary("영상 메타데이터 없음"),
                ..Default::default()
            };
        }
        let video_data: String = data
            .videos
            .iter()
            .map(|v| {
                format!(
                    "- {} | views {} | {} | {}s",
                    v.title, v.view_count, v.upload_date, v.duration
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = render(
            &self.prompts.content_strategy,
            &[
                ("channel_name", data.meta.channel_name.as_str()),
                ("channel_description", data.meta.description.as_str()),
                ("video_data", video_data.as_str()),
            ],
        );
        match self.llm.generate(&prompt, ChatOptions::default()).await {
            Ok(text) => extract_object(&text)
                .and_then(|m| serde_json::from_value(Value::Object(m)).ok())
                .unwrap_or_else(|| ContentStrategy {
                    summary: Self::failed_summary("JSON 파싱 실패"),
                    ..Default::default()
                }),
            Err(e) => ContentStrategy {
                summary: Self::failed_summary(e),
                ..Default::default()
            },
        }
    }

    async fn analyze_concept(
        &self,
        data: &ChannelData,
    ) -> (String, String, String) {
        self.progress.emit("채널 컨셉 분석", &data.meta.channel_name);
        let mut top: Vec<&VideoMetadata> = data.videos.iter().collect();
        top.sort_by_key(|v| std::cmp::Reverse(v.view_count));
        let titles: String = top
            .iter()
            .take(10)
            .map(|v| format!("- {} ({} views)", v.title, v.view_count))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = render(
            &self.prompts.channel_concept,
            &[
                ("channel_name", data.meta.channel_name.as_str()),
                ("video_titles", titles.as_str()),
            ],
        );
        match self.llm.generate(&prompt, ChatOptions::default()).await {
            Ok(text) => match extract_object(&text) {
                Some(m) => (
                    m.get("channel_concept")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    m.get("unique_selling_point")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    m.get("brand_voice")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                ),
                None => (Self::failed_summary("JSON 파싱 실패"), String::new(), String::new()),
            },
            Err(e) => (Self::failed_summary(e), String::new(), String::new()),
        }
    }

    async fn analyze_audience(&self, data: &ChannelData) -> AudienceProfile {
        self.progress.emit("오디언스 분석", &data.meta.channel_name);
        let titles: String = data
            .videos
            .iter()
            .map(|v| format!("- {}", v.title))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = render(
            &self.prompts.audience_profile,
            &[
                ("channel_name", data.meta.channel_name.as_str()),
                ("video_titles", titles.as_str()),
            ],
        );
        match self.llm.generate(&prompt, ChatOptions::default()).await {
            Ok(text) => extract_object(&text)
                .and_then(|m| serde_json::from_value(Value::Object(m)).ok())
                .unwrap_or_else(|| AudienceProfile {
                    summary: Self::failed_summary("JSON 파싱 실패"),
                    ..Default::default()
                }),
            Err(e) => AudienceProfile {
                summary: Self::failed_summary(e),
                ..Default::default()
            },
        }
    }

    async fn build_replication_guide(&self, report: &BenchmarkReport) -> Map<String, Value> {
        let analysis = format!(
            "컨셉: {}\nUSP: {}\n브랜드 보이스: {}\n썸네일: {}\n대본: {}\n전략: {}\n오디언스: {}",
            report.channel_concept,
            report.unique_selling_point,
            report.brand_voice,
            report.thumbnail_pattern.summary,
            report.script_pattern.summary,
            report.content_strategy.summary,
            report.audience_profile.summary,
        );

        let mut guide = Map::new();
        let sections = [
            "channel_setup",
            "content_planning",
            "thumbnail_guide",
            "script_template",
            "engagement_strategy",
            "first_10_videos",
        ];
        for section in sections {
            self.progress.emit("복제 가이드", section);
            let Some(template) = self.prompts.replication_sections.get(section) else {
                continue;
            };
            let prompt = render(template, &[("analysis", analysis.as_str())]);
            let value = match self.llm.generate(&prompt, ChatOptions::default()).await {
                Ok(text) => extract_object(&text)
                    .map(Value::Object)
                    .unwrap_or_else(|| json!({"error": Self::failed_summary("JSON 파싱 실패")})),
                Err(e) => json!({"error": Self::failed_summary(e)}),
            };
            guide.insert(section.to_string(), value);
        }
        guide
    }

    async fn start_analysis(&mut self) -> AgentResult {
        if self.confirmed_urls.is_empty() {
            if let Some(url) = self.pending_url.take() {
                self.confirmed_urls.push(url);
            }
        }
        if self.confirmed_urls.is_empty() {
            self.phase = Phase::Ask;
            return self.ask_again("분석할 채널 URL을 입력해주세요.");
        }

        self.phase = Phase::Analyze;
        self.status = AgentStatus::Running;
        self.progress
            .emit("분석 시작", format!("{}개 채널", self.confirmed_urls.len()));

        let mut collected = Vec::new();
        for url in self.confirmed_urls.clone() {
            match self.collect_channel(&url).await {
                Ok(data) => collected.push(data),
                Err(e) => {
                    warn!(url = %url, error = %e, "channel collection failed");
                }
            }
        }

        if collected.is_empty() {
            self.phase = Phase::Ask;
            self.status = AgentStatus::WaitingFeedback;
            return self.ask_again(
                "채널 데이터를 수집하지 못했습니다. 다른 URL을 입력하거나 \"스킵\"을 입력하세요.",
            );
        }

        // The first channel anchors the single-channel sub-analyses; every
        // collected channel contributes its name and video count.
        let primary = &collected[0];
        let (concept, usp, brand_voice) = self.analyze_concept(primary).await;
        let mut report = BenchmarkReport {
            analyzed_channels: collected
                .iter()
                .map(|c| c.meta.channel_name.clone())
                .collect(),
            analyzed_videos_count: collected.iter().map(|c| c.videos.len() as u64).sum(),
            channel_concept: concept,
            unique_selling_point: usp,
            brand_voice,
            thumbnail_pattern: self.analyze_thumbnails(primary).await,
            script_pattern: self.analyze_scripts(primary).await,
            content_strategy: self.analyze_strategy(primary).await,
            audience_profile: self.analyze_audience(primary).await,
            replication_guide: Map::new(),
        };
        report.replication_guide = self.build_replication_guide(&report).await;

        let urls: Vec<String> = collected.iter().map(|c| c.url.clone()).collect();
        if let Err(e) = self.cache.save(&urls, &report) {
            warn!(error = %e, "benchmark cache save failed");
        }

        let message = Self::format_report(&report);
        self.report = Some(report.clone());
        self.phase = Phase::Report;
        self.status = AgentStatus::WaitingFeedback;
        self.progress.emit("분석 완료", "");

        AgentResult::ok("benchmark_report", message)
            .with_data("report", report.to_value())
    }

    fn format_report(report: &BenchmarkReport) -> String {
        let mut out = String::from("# 벤치마크 리포트\n\n");
        out.push_str(&format!(
            "**분석 채널:** {}\n**분석 영상 수:** {}개\n\n",
            report.analyzed_channels.join(", "),
            report.analyzed_videos_count
        ));
        out.push_str(&format!("## 채널 컨셉\n{}\n\n", report.channel_concept));
        if !report.unique_selling_point.is_empty() {
            out.push_str(&format!("**USP:** {}\n\n", report.unique_selling_point));
        }
        if !report.brand_voice.is_empty() {
            out.push_str(&format!("**브랜드 보이스:** {}\n\n", report.brand_voice));
        }
        out.push_str(&format!(
            "## 썸네일 패턴\n{}\n\n## 대본 패턴\n{}\n\n## 콘텐츠 전략\n{}\n\n## 오디언스\n{}\n",
            report.thumbnail_pattern.summary,
            report.script_pattern.summary,
            report.content_strategy.summary,
            report.audience_profile.summary,
        ));
        if !report.replication_guide.is_empty() {
            out.push_str(&format!(
                "\n복제 가이드 {}개 섹션이 준비되었습니다.\n",
                report.replication_guide.len()
            ));
        }
        out
    }
}

#[async_trait]
impl Agent for BenchmarkerAgent {
    fn name(&self) -> &str {
        "benchmarker"
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError> {
        self.phase = Phase::Ask;
        self.status = AgentStatus::WaitingFeedback;
        let channel = input
            .get_str(crate::context::keys::SELECTED_CHANNEL_NAME)
            .unwrap_or("");
        Ok(AgentResult::ok(
            "benchmark_ask",
            format!(
                "**{channel}** 채널을 위한 벤치마킹을 시작합니다!\n\n\
참고하고 싶은 YouTube 채널 URL을 입력해주세요.\n예: youtube.com/@채널명\n\n\
벤치마킹 없이 진행하려면 \"스킵\"을 입력하세요."
            ),
        )
        .awaiting_feedback())
    }

    async fn handle_feedback(
        &mut self,
        feedback: &str,
        _images: &[String],
    ) -> Result<AgentResult, StudioError> {
        if intent::is_skip(feedback) {
            self.status = AgentStatus::Completed;
            return Ok(AgentResult::skipped("benchmark_skipped"));
        }

        let result = match self.phase {
            Phase::Ask => self.handle_ask(feedback).await,
            Phase::Confirm => self.handle_confirm(feedback).await,
            Phase::Collect => self.handle_collect(feedback).await,
            Phase::Analyze => AgentResult::ok(
                "benchmark_analyze",
                "분석이 진행 중입니다. 잠시만 기다려주세요.",
            )
            .awaiting_feedback(),
            Phase::Report => self.handle_report(feedback).await,
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_extraction_accepts_all_channel_forms() {
        for text in [
            "https://youtube.com/@handle 어때?",
            "youtube.com/channel/UCabc 봐줘",
            "www.youtube.com/c/custom",
            "youtube.com/user/legacy",
            "https://youtu.be/abc123",
            "youtube.com/watch?v=abc123",
        ] {
            assert!(extract_youtube_url(text).is_some(), "{text}");
        }
    }

    #[test]
    fn url_extraction_adds_scheme() {
        assert_eq!(
            extract_youtube_url("youtube.com/@foo").as_deref(),
            Some("https://youtube.com/@foo")
        );
    }

    #[test]
    fn non_urls_are_rejected() {
        assert!(extract_youtube_url("그냥 텍스트입니다").is_none());
    }
}
