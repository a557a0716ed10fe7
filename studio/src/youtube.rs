//! YouTube data collection over the downloader and transcoder tools.
//!
//! Metadata comes from the downloader's JSON dump modes (one JSON document
//! per line for playlists), transcripts from its VTT subtitle fetch, and
//! cloning references from audio-only extraction plus a transcoder segment
//! cut. Every invocation works inside its own scratch directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::adapters::{AdapterError, CommandRunner, HttpDownloader};
use crate::benchmark::{ChannelMetadata, VideoMetadata};

static VIDEO_ID_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"youtube\.com/watch\?v=([^&\s]+)").unwrap(),
        Regex::new(r"youtu\.be/([^?\s]+)").unwrap(),
        Regex::new(r"youtube\.com/shorts/([^?\s]+)").unwrap(),
    ]
});

static CHANNEL_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/(channel/|@|c/|user/)").unwrap());

/// Extracts the video id from a watch/short/youtu.be URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RES
        .iter()
        .find_map(|re| re.captures(url).map(|c| c[1].to_string()))
}

pub fn is_channel_url(url: &str) -> bool {
    CHANNEL_URL_RE.is_match(url)
}

/// Parses `SS`, `MM:SS` or `HH:MM:SS` into seconds.
pub fn parse_clock_time(time_str: &str) -> Option<u64> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    let nums: Vec<u64> = parts
        .iter()
        .map(|p| p.trim().parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match nums.as_slice() {
        [s] => Some(*s),
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}

/// Converts VTT subtitles to plain deduplicated text.
pub fn parse_vtt(vtt: &str) -> String {
    static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
    let mut seen = std::collections::HashSet::new();
    let mut lines = Vec::new();
    for line in vtt.lines() {
        if line.contains("-->")
            || line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
        {
            continue;
        }
        let clean = TAG_RE.replace_all(line, "").trim().to_string();
        if clean.is_empty() {
            continue;
        }
        if seen.insert(clean.clone()) {
            lines.push(clean);
        }
    }
    lines.join(" ")
}

fn best_thumbnail(thumbnails: Option<&Vec<Value>>) -> String {
    thumbnails
        .and_then(|list| {
            list.iter().max_by_key(|t| {
                t.get("height").and_then(Value::as_u64).unwrap_or(0)
                    * t.get("width").and_then(Value::as_u64).unwrap_or(0)
            })
        })
        .and_then(|t| t.get("url").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn video_from_json(data: &Value) -> VideoMetadata {
    VideoMetadata {
        video_id: data.get("id").and_then(Value::as_str).unwrap_or_default().into(),
        title: data.get("title").and_then(Value::as_str).unwrap_or_default().into(),
        description: data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .into(),
        view_count: data.get("view_count").and_then(Value::as_u64).unwrap_or(0),
        like_count: data.get("like_count").and_then(Value::as_u64).unwrap_or(0),
        comment_count: data.get("comment_count").and_then(Value::as_u64).unwrap_or(0),
        duration: data
            .get("duration")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as u64,
        upload_date: data
            .get("upload_date")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .into(),
        thumbnail_url: best_thumbnail(data.get("thumbnails").and_then(Value::as_array)),
        tags: data
            .get("tags")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Appends `/videos` so playlist modes land on the uploads tab.
fn videos_tab_url(channel_url: &str) -> String {
    let url = channel_url.trim_end_matches('/');
    if url.ends_with("/videos") {
        url.to_string()
    } else {
        format!("{url}/videos")
    }
}

/// Collects channel and video metadata via the downloader tool.
pub struct YouTubeService {
    runner: Arc<dyn CommandRunner>,
    downloader: Arc<HttpDownloader>,
    ytdlp: String,
    ffmpeg: String,
}

impl YouTubeService {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        downloader: Arc<HttpDownloader>,
        ytdlp: impl Into<String>,
        ffmpeg: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            downloader,
            ytdlp: ytdlp.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    async fn run_ytdlp(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        let mut argv = vec![self.ytdlp.clone()];
        argv.extend(args.iter().map(|s| s.to_string()));
        let out = self.runner.run(&argv, cwd, timeout).await?;
        if !out.success() && out.stdout.is_empty() {
            return Err(AdapterError::transient(format!(
                "downloader failed: {}",
                out.stderr_utf8().lines().last().unwrap_or("")
            )));
        }
        Ok(out.stdout_utf8())
    }

    /// Channel metadata from the first upload plus a fast flat count.
    pub async fn channel_info(
        &self,
        channel_url: &str,
    ) -> Result<Option<ChannelMetadata>, AdapterError> {
        let url = videos_tab_url(channel_url);
        let stdout = self
            .run_ytdlp(
                &["--dump-json", "--playlist-items", "1", &url],
                None,
                Duration::from_secs(60),
            )
            .await?;
        let Some(first_line) = stdout.lines().find(|l| !l.trim().is_empty()) else {
            return Ok(None);
        };
        let data: Value = serde_json::from_str(first_line)
            .map_err(|e| AdapterError::parse(format!("channel dump: {e}")))?;

        // Flat listing is cheap; count up to 100 uploads.
        let video_count = match self
            .run_ytdlp(
                &[
                    "--flat-playlist",
                    "--dump-json",
                    "--playlist-items",
                    "1:100",
                    &url,
                ],
                None,
                Duration::from_secs(60),
            )
            .await
        {
            Ok(flat) => flat.lines().filter(|l| !l.trim().is_empty()).count() as u64,
            Err(_) => 0,
        };

        let description = data
            .get("channel_description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "최근 영상: {}",
                    data.get("title").and_then(Value::as_str).unwrap_or_default()
                )
            });

        Ok(Some(ChannelMetadata {
            channel_id: data
                .get("channel_id")
                .or_else(|| data.get("uploader_id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .into(),
            channel_name: data
                .get("channel")
                .or_else(|| data.get("uploader"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .into(),
            subscriber_count: data
                .get("channel_follower_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            video_count,
            description,
            thumbnail_url: data
                .get("thumbnail")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .into(),
        }))
    }

    /// Up to `max_videos` recent uploads (flat listing, one JSON per line).
    pub async fn channel_videos(
        &self,
        channel_url: &str,
        max_videos: usize,
    ) -> Result<Vec<VideoMetadata>, AdapterError> {
        let url = videos_tab_url(channel_url);
        let range = format!("1:{max_videos}");
        let stdout = self
            .run_ytdlp(
                &["--dump-json", "--flat-playlist", "--playlist-items", &range, &url],
                None,
                Duration::from_secs(90),
            )
            .await?;
        let videos = stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .map(|v| video_from_json(&v))
            .collect();
        Ok(videos)
    }

    /// Subtitle text (manual or auto) for one video, preferred languages
    /// first, truncated to `max_chars`.
    pub async fn video_transcript(
        &self,
        video_url: &str,
        max_chars: usize,
    ) -> Result<Option<String>, AdapterError> {
        let Some(video_id) = extract_video_id(video_url) else {
            return Ok(None);
        };
        let scratch = tempfile::tempdir()
            .map_err(|e| AdapterError::resource(format!("scratch dir: {e}")))?;
        let out_tpl = scratch.path().join("sub_%(id)s").display().to_string();
        let langs = ["ko", "en", "en-US", "ko-KR"];

        self.run_ytdlp(
            &[
                "--write-sub",
                "--write-auto-sub",
                "--sub-lang",
                &langs.join(","),
                "--skip-download",
                "--sub-format",
                "vtt",
                "-o",
                &out_tpl,
                video_url,
            ],
            None,
            Duration::from_secs(60),
        )
        .await?;

        for lang in langs {
            for suffix in ["", "-orig"] {
                let path = scratch
                    .path()
                    .join(format!("sub_{video_id}.{lang}{suffix}.vtt"));
                if let Ok(content) = std::fs::read_to_string(&path) {
                    let mut text = parse_vtt(&content);
                    if text.chars().count() > max_chars {
                        text = text.chars().take(max_chars).collect();
                    }
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }

    /// Downloads one thumbnail image.
    pub async fn download_thumbnail(&self, url: &str) -> Result<Vec<u8>, AdapterError> {
        self.downloader.fetch_bytes(url, Duration::from_secs(30)).await
    }

    /// Cuts a `[start, end]` audio segment from a video for voice cloning:
    /// audio-only download, then a mono 24 kHz cut. The window is capped at
    /// 60 seconds.
    pub async fn extract_audio_segment(
        &self,
        video_url: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<u8>, AdapterError> {
        let video_id = extract_video_id(video_url)
            .ok_or_else(|| AdapterError::fatal(format!("not a video URL: {video_url}")))?;
        let start_sec = parse_clock_time(start)
            .ok_or_else(|| AdapterError::fatal(format!("bad start time: {start}")))?;
        let end_sec = parse_clock_time(end)
            .ok_or_else(|| AdapterError::fatal(format!("bad end time: {end}")))?;
        if end_sec <= start_sec {
            return Err(AdapterError::fatal(format!(
                "invalid time range: {start}-{end}"
            )));
        }
        let duration = end_sec - start_sec;
        if duration > 60 {
            return Err(AdapterError::fatal(
                "maximum duration is 60 seconds for voice cloning",
            ));
        }

        let scratch = tempfile::tempdir()
            .map_err(|e| AdapterError::resource(format!("scratch dir: {e}")))?;
        let full_path = scratch.path().join(format!("{video_id}_full.wav"));
        let segment_path = scratch.path().join(format!("{video_id}_segment.wav"));

        self.run_ytdlp(
            &[
                "-x",
                "--audio-format",
                "wav",
                "--audio-quality",
                "0",
                "-o",
                &full_path.display().to_string(),
                "--no-playlist",
                video_url,
            ],
            None,
            Duration::from_secs(180),
        )
        .await?;

        // The downloader may append its own extension.
        let source = if full_path.exists() {
            full_path.clone()
        } else {
            let appended = scratch.path().join(format!("{video_id}_full.wav.wav"));
            if appended.exists() {
                appended
            } else {
                std::fs::read_dir(scratch.path())
                    .ok()
                    .and_then(|entries| {
                        entries.flatten().map(|e| e.path()).find(|p| {
                            p.file_name()
                                .map(|n| n.to_string_lossy().starts_with(&video_id))
                                .unwrap_or(false)
                        })
                    })
                    .ok_or_else(|| AdapterError::resource("audio download produced no file"))?
            }
        };

        let ffmpeg_argv: Vec<String> = vec![
            self.ffmpeg.clone(),
            "-i".into(),
            source.display().to_string(),
            "-ss".into(),
            start_sec.to_string(),
            "-t".into(),
            duration.to_string(),
            "-ar".into(),
            "24000".into(),
            "-ac".into(),
            "1".into(),
            "-y".into(),
            segment_path.display().to_string(),
        ];
        let out = self
            .runner
            .run(&ffmpeg_argv, None, Duration::from_secs(60))
            .await?;
        if !segment_path.exists() {
            return Err(AdapterError::resource(format!(
                "segment extraction failed: {}",
                out.stderr_utf8().lines().last().unwrap_or("")
            )));
        }
        debug!(video_id, start_sec, duration, "audio segment extracted");
        std::fs::read(&segment_path)
            .map_err(|e| AdapterError::resource(format!("read segment: {e}")))
    }

    /// Transcript text covering a `[start, end]` window, when subtitles exist.
    pub async fn transcript_segment(
        &self,
        video_url: &str,
        _start: &str,
        _end: &str,
    ) -> Result<Option<String>, AdapterError> {
        // The cloning reference only needs approximate text; reuse the full
        // transcript truncated to a sentence-sized chunk.
        let transcript = self.video_transcript(video_url, 400).await?;
        Ok(transcript.filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_video_ids_from_all_url_shapes() {
        assert_eq!(
            extract_video_id("https://youtube.com/watch?v=abc123&t=10"),
            Some("abc123".into())
        );
        assert_eq!(
            extract_video_id("https://youtu.be/xyz?feature=share"),
            Some("xyz".into())
        );
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/sh0rt"),
            Some("sh0rt".into())
        );
        assert_eq!(extract_video_id("https://youtube.com/@channel"), None);
    }

    #[test]
    fn parses_clock_times() {
        assert_eq!(parse_clock_time("45"), Some(45));
        assert_eq!(parse_clock_time("1:30"), Some(90));
        assert_eq!(parse_clock_time("01:02:03"), Some(3723));
        assert_eq!(parse_clock_time("abc"), None);
    }

    #[test]
    fn vtt_parsing_strips_cues_and_duplicates() {
        let vtt = "WEBVTT\nKind: captions\n\n00:00.000 --> 00:02.000\n<c>안녕하세요</c>\n\n00:02.000 --> 00:04.000\n안녕하세요\n여러분\n";
        assert_eq!(parse_vtt(vtt), "안녕하세요 여러분");
    }

    #[test]
    fn videos_tab_url_appends_once() {
        assert_eq!(
            videos_tab_url("https://youtube.com/@foo"),
            "https://youtube.com/@foo/videos"
        );
        assert_eq!(
            videos_tab_url("https://youtube.com/@foo/videos"),
            "https://youtube.com/@foo/videos"
        );
    }
}
