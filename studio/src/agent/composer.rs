//! Composer agent: merges per-scene videos, audio and subtitles into the
//! final deliverable.
//!
//! Per scene the video is adjusted to its audio duration (copy under 0.1 s
//! difference, trim when the audio is shorter, PTS retime when the speed
//! factor stays at or above 0.8, last-frame hold otherwise), an SRT track
//! is built from cumulative durations, then videos and audios are
//! concatenated and muxed with burned subtitles. Any failing step aborts
//! the composition with a structured error; intermediates are kept for
//! inspection on failure and removed on success.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use super::{intent, Agent, AgentResult, AgentStatus};
use crate::adapters::{AdapterError, CommandRunner};
use crate::context::{keys, SessionContext};
use crate::error::StudioError;
use crate::paths::PathPolicy;
use crate::progress::ProgressHandle;

/// Below this speed factor the video holds its last frame instead of
/// retiming; the boundary itself retimes.
pub const MIN_SPEED_FACTOR: f64 = 0.8;
/// Differences under this are passed through untouched.
pub const SYNC_EPSILON: f64 = 0.1;

const TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// How one scene's video is brought to its audio duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    Copy,
    Trim,
    Retime,
    HoldLastFrame,
}

/// Decides the adjustment for a scene.
pub fn sync_action(video_dur: f64, audio_dur: f64) -> SyncAction {
    if (video_dur - audio_dur).abs() < SYNC_EPSILON {
        SyncAction::Copy
    } else if audio_dur < video_dur {
        SyncAction::Trim
    } else if video_dur / audio_dur >= MIN_SPEED_FACTOR {
        SyncAction::Retime
    } else {
        SyncAction::HoldLastFrame
    }
}

/// `HH:MM:SS,mmm` for SRT cues.
pub fn format_srt_time(seconds: f64) -> String {
    let total_millis = (seconds * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

struct Scene {
    index: usize,
    script_line: String,
    video_path: PathBuf,
    audio_path: PathBuf,
    audio_duration: f64,
    start_time: f64,
    end_time: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Ready,
    Review,
    Done,
}

pub struct ComposerAgent {
    runner: Arc<dyn CommandRunner>,
    paths: Arc<PathPolicy>,
    progress: ProgressHandle,
    ffmpeg: String,
    ffprobe: String,

    status: AgentStatus,
    phase: Phase,
    session_id: String,
    final_video: Option<PathBuf>,
    subtitle_file: Option<PathBuf>,
}

impl ComposerAgent {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        paths: Arc<PathPolicy>,
        progress: ProgressHandle,
        ffmpeg: &str,
        ffprobe: &str,
    ) -> Self {
        Self {
            runner,
            paths,
            progress,
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            status: AgentStatus::Idle,
            phase: Phase::Ready,
            session_id: String::new(),
            final_video: None,
            subtitle_file: None,
        }
    }

    async fn ffmpeg_run(&self, args: &[String]) -> Result<(), AdapterError> {
        let mut argv = vec![self.ffmpeg.clone(), "-y".to_string()];
        argv.extend(args.iter().cloned());
        let out = self.runner.run(&argv, None, TOOL_TIMEOUT).await?;
        if !out.success() {
            return Err(AdapterError::fatal(format!(
                "transcoder exited {}: {}",
                out.exit_code,
                out.stderr_utf8().lines().last().unwrap_or("")
            )));
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, AdapterError> {
        let argv: Vec<String> = vec![
            self.ffprobe.clone(),
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            path.display().to_string(),
        ];
        let out = self.runner.run(&argv, None, Duration::from_secs(30)).await?;
        out.stdout_utf8()
            .trim()
            .parse::<f64>()
            .map_err(|_| AdapterError::parse(format!("duration probe of {}", path.display())))
    }

    async fn adjust_video(
        &self,
        video: &Path,
        audio_dur: f64,
        output: &Path,
    ) -> Result<SyncAction, AdapterError> {
        let video_dur = self.probe_duration(video).await?;
        let action = sync_action(video_dur, audio_dur);
        let video_s = video.display().to_string();
        let output_s = output.display().to_string();

        match action {
            SyncAction::Copy => {
                std::fs::copy(video, output)
                    .map_err(|e| AdapterError::resource(format!("copy: {e}")))?;
            }
            SyncAction::Trim => {
                self.ffmpeg_run(&[
                    "-i".into(),
                    video_s,
                    "-t".into(),
                    audio_dur.to_string(),
                    "-c:v".into(),
                    "libx264".into(),
                    "-crf".into(),
                    "18".into(),
                    output_s,
                ])
                .await?;
            }
            SyncAction::Retime => {
                let speed_factor = video_dur / audio_dur;
                self.ffmpeg_run(&[
                    "-i".into(),
                    video_s,
                    "-vf".into(),
                    format!("setpts={}*PTS", 1.0 / speed_factor),
                    "-c:v".into(),
                    "libx264".into(),
                    "-crf".into(),
                    "18".into(),
                    output_s,
                ])
                .await?;
            }
            SyncAction::HoldLastFrame => {
                self.ffmpeg_run(&[
                    "-i".into(),
                    video_s,
                    "-vf".into(),
                    format!(
                        "tpad=stop_mode=clone:stop_duration={}",
                        audio_dur - video_dur
                    ),
                    "-c:v".into(),
                    "libx264".into(),
                    "-crf".into(),
                    "18".into(),
                    output_s,
                ])
                .await?;
            }
        }
        Ok(action)
    }

    fn write_srt(scenes: &[Scene], path: &Path) -> std::io::Result<()> {
        let mut out = String::new();
        for (i, scene) in scenes.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                format_srt_time(scene.start_time),
                format_srt_time(scene.end_time),
                scene.script_line
            ));
        }
        std::fs::write(path, out)
    }

    async fn concat_videos(&self, videos: &[PathBuf], output: &Path) -> Result<(), AdapterError> {
        let list_path = output.with_extension("txt");
        let list: String = videos
            .iter()
            .map(|v| format!("file '{}'\n", v.display()))
            .collect();
        std::fs::write(&list_path, list)
            .map_err(|e| AdapterError::resource(format!("concat list: {e}")))?;

        let result = self
            .ffmpeg_run(&[
                "-f".into(),
                "concat".into(),
                "-safe".into(),
                "0".into(),
                "-i".into(),
                list_path.display().to_string(),
                "-c:v".into(),
                "libx264".into(),
                "-crf".into(),
                "18".into(),
                output.display().to_string(),
            ])
            .await;
        let _ = std::fs::remove_file(&list_path);
        result
    }

    async fn concat_audios(&self, audios: &[PathBuf], output: &Path) -> Result<(), AdapterError> {
        let mut args: Vec<String> = Vec::new();
        for audio in audios {
            args.push("-i".into());
            args.push(audio.display().to_string());
        }
        let inputs: String = (0..audios.len()).map(|i| format!("[{i}:a]")).collect();
        args.push("-filter_complex".into());
        args.push(format!("{inputs}concat=n={}:v=0:a=1[out]", audios.len()));
        args.push("-map".into());
        args.push("[out]".into());
        args.push(output.display().to_string());
        self.ffmpeg_run(&args).await
    }

    async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        subtitles: &Path,
        output: &Path,
        burn_subtitles: bool,
    ) -> Result<(), AdapterError> {
        if burn_subtitles {
            self.ffmpeg_run(&[
                "-i".into(),
                video.display().to_string(),
                "-i".into(),
                audio.display().to_string(),
                "-vf".into(),
                format!(
                    "subtitles={}:force_style='FontSize=24,PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,Outline=2,Shadow=1'",
                    subtitles.display()
                ),
                "-c:v".into(),
                "libx264".into(),
                "-crf".into(),
                "18".into(),
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                "192k".into(),
                "-shortest".into(),
                output.display().to_string(),
            ])
            .await
        } else {
            self.ffmpeg_run(&[
                "-i".into(),
                video.display().to_string(),
                "-i".into(),
                audio.display().to_string(),
                "-i".into(),
                subtitles.display().to_string(),
                "-c:v".into(),
                "copy".into(),
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                "192k".into(),
                "-c:s".into(),
                "mov_text".into(),
                "-shortest".into(),
                output.display().to_string(),
            ])
            .await
        }
    }

    async fn build_scenes(
        &self,
        videos: &[Value],
        audios: &[Value],
        prompts: &[Value],
    ) -> Result<Vec<Scene>, AdapterError> {
        let mut scenes = Vec::new();
        let mut current_time = 0.0f64;

        for (i, (video, audio)) in videos.iter().zip(audios.iter()).enumerate() {
            let video_path = video
                .get("video_path")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let audio_path = audio
                .get("filepath")
                .or_else(|| audio.get("audio_path"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if video_path.is_empty() || audio_path.is_empty() {
                continue;
            }
            let video_path = PathBuf::from(video_path);
            let audio_path = PathBuf::from(audio_path);
            if !video_path.exists() || !audio_path.exists() {
                warn!(scene = i + 1, "scene files missing, skipping");
                continue;
            }

            let audio_duration = self.probe_duration(&audio_path).await?;
            let script_line = prompts
                .get(i)
                .and_then(|p| p.get("script_line"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            scenes.push(Scene {
                index: i + 1,
                script_line,
                video_path,
                audio_path,
                audio_duration,
                start_time: current_time,
                end_time: current_time + audio_duration,
            });
            current_time += audio_duration;
        }
        Ok(scenes)
    }

    async fn compose(
        &mut self,
        videos: &[Value],
        audios: &[Value],
        prompts: &[Value],
    ) -> AgentResult {
        self.progress.emit(
            "합성 준비",
            format!("비디오 {}개, 오디오 {}개", videos.len(), audios.len()),
        );

        let scenes = match self.build_scenes(videos, audios, prompts).await {
            Ok(scenes) => scenes,
            Err(e) => {
                self.status = AgentStatus::Error;
                return AgentResult::failed("compose", format!("오디오 길이 측정 실패: {e}"))
                    .with_data("error", json!(e.to_string()));
            }
        };
        if scenes.is_empty() {
            self.status = AgentStatus::Error;
            return AgentResult::failed("compose", "유효한 장면이 없습니다.")
                .with_data("error", json!("no valid scenes"));
        }

        let out_dir = self.paths.session_output_dir(&self.session_id);
        if let Err(e) = std::fs::create_dir_all(&out_dir) {
            self.status = AgentStatus::Error;
            return AgentResult::failed("compose", format!("출력 디렉토리 생성 실패: {e}"));
        }

        // 1. Sync each video to its audio duration.
        let mut adjusted = Vec::with_capacity(scenes.len());
        for scene in &scenes {
            self.progress
                .emit("비디오 조절", format!("장면 {}", scene.index));
            let out = out_dir.join(format!("adjusted_{:03}.mp4", scene.index));
            match self
                .adjust_video(&scene.video_path, scene.audio_duration, &out)
                .await
            {
                Ok(_) => adjusted.push(out),
                Err(e) => {
                    self.status = AgentStatus::Error;
                    return AgentResult::failed(
                        "compose",
                        format!("장면 {} 조절 실패: {e}", scene.index),
                    )
                    .with_data("error", json!(e.to_string()));
                }
            }
        }

        // 2. Subtitles from cumulative audio durations.
        self.progress.emit("자막 생성", "SRT 파일 생성 중");
        let srt_path = out_dir.join("subtitles.srt");
        if let Err(e) = Self::write_srt(&scenes, &srt_path) {
            self.status = AgentStatus::Error;
            return AgentResult::failed("compose", format!("자막 생성 실패: {e}"));
        }

        // 3-4. Concatenate videos and audios.
        self.progress.emit("비디오 합성", "비디오 연결 중");
        let concat_video = out_dir.join("concat_video.mp4");
        if let Err(e) = self.concat_videos(&adjusted, &concat_video).await {
            self.status = AgentStatus::Error;
            return AgentResult::failed("compose", format!("비디오 연결 실패: {e}"))
                .with_data("error", json!(e.to_string()));
        }

        self.progress.emit("오디오 합성", "오디오 연결 중");
        let audio_paths: Vec<PathBuf> = scenes.iter().map(|s| s.audio_path.clone()).collect();
        let concat_audio = out_dir.join("concat_audio.wav");
        if let Err(e) = self.concat_audios(&audio_paths, &concat_audio).await {
            self.status = AgentStatus::Error;
            return AgentResult::failed("compose", format!("오디오 연결 실패: {e}"))
                .with_data("error", json!(e.to_string()));
        }

        // 5. Final merge with burned subtitles.
        self.progress.emit("최종 합성", "비디오+오디오+자막 합성 중");
        let final_path = out_dir.join(format!("final_{}.mp4", self.session_id));
        if let Err(e) = self
            .merge(&concat_video, &concat_audio, &srt_path, &final_path, true)
            .await
        {
            // Intermediates stay on disk for inspection.
            self.status = AgentStatus::Error;
            return AgentResult::failed("compose", format!("최종 합성 실패: {e}"))
                .with_data("error", json!(e.to_string()));
        }

        // 6. Success: clean intermediates.
        for path in adjusted.iter().chain([&concat_video, &concat_audio]) {
            let _ = std::fs::remove_file(path);
        }

        let total: f64 = scenes.iter().map(|s| s.audio_duration).sum();
        let mut message = format!(
            "# 영상 합성 완료\n\n**총 길이:** {total:.1}초 ({}개 장면)\n\n\
**출력 파일:**\n- 최종 영상: `{}`\n- 자막 파일: `{}`\n\n**장면 구성:**\n",
            scenes.len(),
            final_path.display(),
            srt_path.display()
        );
        for scene in &scenes {
            message.push_str(&format!(
                "- 장면 {}: {:.1}초 ({:.1}s ~ {:.1}s)\n",
                scene.index, scene.audio_duration, scene.start_time, scene.end_time
            ));
        }
        message.push_str("\n확인을 입력하면 완료됩니다.");

        self.final_video = Some(final_path.clone());
        self.subtitle_file = Some(srt_path.clone());
        self.phase = Phase::Review;
        self.status = AgentStatus::WaitingFeedback;

        AgentResult::ok("compose_done", message)
            .with_data(keys::FINAL_VIDEO, json!(final_path.display().to_string()))
            .with_data(keys::SUBTITLE_FILE, json!(srt_path.display().to_string()))
            .awaiting_feedback()
    }
}

#[async_trait]
impl Agent for ComposerAgent {
    fn name(&self) -> &str {
        "composer"
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    async fn execute(&mut self, input: &SessionContext) -> Result<AgentResult, StudioError> {
        self.status = AgentStatus::Running;
        self.phase = Phase::Ready;
        self.session_id = input
            .get_str(keys::SESSION_ID)
            .unwrap_or("default")
            .to_string();

        let videos = input.get_array("videos").cloned().unwrap_or_default();
        let audios = input.get_array("audios").cloned().unwrap_or_default();
        let prompts = input.get_array("prompts").cloned().unwrap_or_default();

        if videos.is_empty() || audios.is_empty() {
            self.status = AgentStatus::Error;
            return Ok(AgentResult::failed(
                "compose",
                "비디오 또는 오디오 데이터가 없습니다.",
            )
            .with_data("error", json!("missing video or audio data")));
        }

        Ok(self.compose(&videos, &audios, &prompts).await)
    }

    async fn handle_feedback(
        &mut self,
        feedback: &str,
        _images: &[String],
    ) -> Result<AgentResult, StudioError> {
        if intent::is_skip(feedback) {
            self.status = AgentStatus::Completed;
            return Ok(AgentResult::skipped("compose_skipped"));
        }

        let result = match self.phase {
            Phase::Review if intent::is_confirmation(feedback) => {
                self.phase = Phase::Done;
                self.status = AgentStatus::Completed;
                let mut result =
                    AgentResult::ok("compose_confirmed", "최종 영상이 확정되었습니다!");
                if let Some(ref path) = self.final_video {
                    result = result
                        .with_data(keys::FINAL_VIDEO, json!(path.display().to_string()));
                }
                if let Some(ref path) = self.subtitle_file {
                    result = result
                        .with_data(keys::SUBTITLE_FILE, json!(path.display().to_string()));
                }
                result
            }
            Phase::Done => AgentResult::ok("compose_confirmed", "이미 완료되었습니다."),
            _ => AgentResult::ok("compose", "확인을 입력하면 완료됩니다.").awaiting_feedback(),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_action_boundaries() {
        assert_eq!(sync_action(3.0, 3.05), SyncAction::Copy);
        assert_eq!(sync_action(5.0, 3.0), SyncAction::Trim);
        // factor exactly 0.8 retimes; just below holds the last frame.
        assert_eq!(sync_action(4.0, 5.0), SyncAction::Retime);
        assert_eq!(sync_action(3.9, 5.0), SyncAction::HoldLastFrame);
    }

    #[test]
    fn srt_time_formatting() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(75.5), "00:01:15,500");
        assert_eq!(format_srt_time(3661.042), "01:01:01,042");
    }
}
