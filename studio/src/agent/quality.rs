//! Quality checking for generated images and videos.
//!
//! Local mode computes pixel statistics only: frames are decoded to raw
//! RGB24 through the transcoder (no image decoder is linked) and scored on
//! white ratio, outline (near-black) ratio, color spread and resolution.
//! Vision mode submits the character reference plus sampled frames to the
//! vision adapter with a strict PASS/FAIL prompt. Output shape is uniform
//! across modes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use serde_json::{json, Map, Value};

use crate::adapters::{AdapterError, CommandRunner, QualityVerdict, Vision};

/// Uniform result shape across checker modes.
#[derive(Clone, Debug)]
pub struct QualityReport {
    pub overall_score: f64,
    pub sub_scores: Map<String, Value>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub summary: String,
    pub verdict: Option<String>,
}

impl QualityReport {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("overall_score".into(), json!(self.overall_score));
        map.insert("sub_scores".into(), Value::Object(self.sub_scores.clone()));
        map.insert("issues".into(), json!(self.issues));
        map.insert("suggestions".into(), json!(self.suggestions));
        map.insert("summary".into(), json!(self.summary));
        if let Some(ref v) = self.verdict {
            map.insert("verdict".into(), json!(v));
        }
        Value::Object(map)
    }
}

/// Raw RGB24 frame with dimensions.
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Per-frame pixel statistics.
#[derive(Clone, Copy, Debug)]
pub struct FrameStats {
    pub white_ratio: f64,
    pub black_ratio: f64,
    pub color_std: f64,
    pub mean_rgb: [f64; 3],
}

/// White: all channels > 240. Black: all channels < 30.
pub fn frame_stats(frame: &RawFrame) -> FrameStats {
    let pixels = (frame.width as usize) * (frame.height as usize);
    if pixels == 0 || frame.rgb.len() < pixels * 3 {
        return FrameStats {
            white_ratio: 0.0,
            black_ratio: 0.0,
            color_std: 0.0,
            mean_rgb: [0.0; 3],
        };
    }

    let mut white = 0usize;
    let mut black = 0usize;
    let mut sum = [0f64; 3];
    let mut sum_sq = 0f64;
    for px in frame.rgb[..pixels * 3].chunks_exact(3) {
        if px[0] > 240 && px[1] > 240 && px[2] > 240 {
            white += 1;
        }
        if px[0] < 30 && px[1] < 30 && px[2] < 30 {
            black += 1;
        }
        for (i, &c) in px.iter().enumerate() {
            sum[i] += c as f64;
            sum_sq += (c as f64) * (c as f64);
        }
    }
    let n = (pixels * 3) as f64;
    let mean_all = (sum[0] + sum[1] + sum[2]) / n;
    let variance = (sum_sq / n - mean_all * mean_all).max(0.0);

    FrameStats {
        white_ratio: white as f64 / pixels as f64 * 100.0,
        black_ratio: black as f64 / pixels as f64 * 100.0,
        color_std: variance.sqrt(),
        mean_rgb: [
            sum[0] / pixels as f64,
            sum[1] / pixels as f64,
            sum[2] / pixels as f64,
        ],
    }
}

/// Decodes a media file to raw RGB frames via the transcoder. For videos,
/// every 8th frame is sampled, capped at `max_frames`; a still image yields
/// one frame.
pub async fn decode_frames(
    runner: &Arc<dyn CommandRunner>,
    ffmpeg: &str,
    ffprobe: &str,
    path: &Path,
    max_frames: usize,
) -> Result<Vec<RawFrame>, AdapterError> {
    let (width, height) = probe_dimensions(runner, ffprobe, path).await?;
    let argv: Vec<String> = vec![
        ffmpeg.to_string(),
        "-i".into(),
        path.display().to_string(),
        "-vf".into(),
        "select=not(mod(n\\,8))".into(),
        "-vsync".into(),
        "vfr".into(),
        "-vframes".into(),
        max_frames.to_string(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-".into(),
    ];

    let out = runner.run(&argv, None, Duration::from_secs(60)).await?;
    let frame_size = (width as usize) * (height as usize) * 3;
    if frame_size == 0 {
        return Err(AdapterError::parse("zero-sized frames"));
    }
    let frames = out
        .stdout
        .chunks_exact(frame_size)
        .map(|chunk| RawFrame {
            width,
            height,
            rgb: chunk.to_vec(),
        })
        .collect::<Vec<_>>();
    if frames.is_empty() {
        return Err(AdapterError::parse("no frames decoded"));
    }
    Ok(frames)
}

async fn probe_dimensions(
    runner: &Arc<dyn CommandRunner>,
    ffprobe: &str,
    path: &Path,
) -> Result<(u32, u32), AdapterError> {
    let argv: Vec<String> = vec![
        ffprobe.to_string(),
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "v:0".into(),
        "-show_entries".into(),
        "stream=width,height".into(),
        "-of".into(),
        "csv=s=x:p=0".into(),
        path.display().to_string(),
    ];
    let out = runner.run(&argv, None, Duration::from_secs(30)).await?;
    let text = out.stdout_utf8();
    let line = text.trim().lines().next().unwrap_or("");
    let (w, h) = line
        .split_once('x')
        .ok_or_else(|| AdapterError::parse(format!("dimension probe: {line:?}")))?;
    Ok((
        w.trim()
            .parse()
            .map_err(|_| AdapterError::parse("bad width"))?,
        h.trim()
            .parse()
            .map_err(|_| AdapterError::parse("bad height"))?,
    ))
}

/// Extracts up to `count` PNG frames from a video as base64, for the vision
/// checker.
pub async fn extract_frames_b64(
    runner: &Arc<dyn CommandRunner>,
    ffmpeg: &str,
    video_path: &Path,
    count: usize,
) -> Result<Vec<String>, AdapterError> {
    let scratch = tempfile::tempdir()
        .map_err(|e| AdapterError::resource(format!("scratch dir: {e}")))?;
    let pattern = scratch.path().join("frame_%03d.png");
    let argv: Vec<String> = vec![
        ffmpeg.to_string(),
        "-i".into(),
        video_path.display().to_string(),
        "-vf".into(),
        "select=not(mod(n\\,8))".into(),
        "-vsync".into(),
        "vfr".into(),
        "-vframes".into(),
        count.to_string(),
        pattern.display().to_string(),
    ];
    runner.run(&argv, None, Duration::from_secs(60)).await?;

    let mut paths: Vec<_> = std::fs::read_dir(scratch.path())
        .map_err(|e| AdapterError::resource(e.to_string()))?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "png").unwrap_or(false))
        .collect();
    paths.sort();

    let mut frames = Vec::new();
    for p in paths {
        let bytes = std::fs::read(&p).map_err(|e| AdapterError::resource(e.to_string()))?;
        frames.push(base64::engine::general_purpose::STANDARD.encode(bytes));
    }
    if frames.is_empty() {
        return Err(AdapterError::parse("frame extraction produced nothing"));
    }
    Ok(frames)
}

/// Pixel-statistics-only checker.
pub struct LocalQualityChecker {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    ffprobe: String,
}

impl LocalQualityChecker {
    pub fn new(runner: Arc<dyn CommandRunner>, ffmpeg: &str, ffprobe: &str) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub async fn analyze_image(&self, path: &Path) -> Result<QualityReport, AdapterError> {
        let frames =
            decode_frames(&self.runner, &self.ffmpeg, &self.ffprobe, path, 1).await?;
        let frame = &frames[0];
        let stats = frame_stats(frame);

        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        let white_score = if stats.white_ratio > 70.0 {
            issues.push(format!("흰색 비율이 너무 높음 ({:.1}%)", stats.white_ratio));
            suggestions.push("캐릭터가 더 크게 그려져야 함".into());
            2.0
        } else if stats.white_ratio > 50.0 {
            issues.push(format!("배경 비율이 높음 ({:.1}%)", stats.white_ratio));
            5.0
        } else if stats.white_ratio > 30.0 {
            7.0
        } else {
            9.0
        };

        let outline_score = if stats.black_ratio < 1.0 {
            issues.push("외곽선이 약함".into());
            suggestions.push("더 굵은 외곽선 추가 필요".into());
            5.0
        } else if stats.black_ratio < 3.0 {
            7.0
        } else {
            9.0
        };

        let color_score = if stats.color_std < 30.0 {
            issues.push("색상이 단조로움".into());
            4.0
        } else if stats.color_std < 50.0 {
            6.0
        } else {
            8.0
        };

        let resolution_score = if frame.width < 512 || frame.height < 512 {
            issues.push(format!("해상도가 낮음 ({}x{})", frame.width, frame.height));
            5.0
        } else if frame.width >= 1024 && frame.height >= 1024 {
            9.0
        } else {
            7.0
        };

        let overall: f64 = (white_score + outline_score + color_score + resolution_score) / 4.0;
        let mut sub_scores = Map::new();
        sub_scores.insert("composition".into(), json!(white_score));
        sub_scores.insert("outline".into(), json!(outline_score));
        sub_scores.insert("color".into(), json!(color_score));
        sub_scores.insert("resolution".into(), json!(resolution_score));

        Ok(QualityReport {
            overall_score: (overall * 10.0).round() / 10.0,
            sub_scores,
            issues,
            suggestions,
            summary: format!(
                "전체 점수 {overall:.1}/10, 흰색 {:.1}%, 외곽선 {:.1}%",
                stats.white_ratio, stats.black_ratio
            ),
            verdict: None,
        })
    }

    pub async fn analyze_video(&self, path: &Path) -> Result<QualityReport, AdapterError> {
        let frames =
            decode_frames(&self.runner, &self.ffmpeg, &self.ffprobe, path, 5).await?;
        let stats: Vec<FrameStats> = frames.iter().map(frame_stats).collect();

        let avg_white = stats.iter().map(|s| s.white_ratio).sum::<f64>() / stats.len() as f64;
        let white_var = {
            let var = stats
                .iter()
                .map(|s| (s.white_ratio - avg_white).powi(2))
                .sum::<f64>()
                / stats.len() as f64;
            var.sqrt()
        };
        let rgb_drift = if stats.len() < 2 {
            0.0
        } else {
            stats
                .windows(2)
                .map(|w| {
                    w[0].mean_rgb
                        .iter()
                        .zip(w[1].mean_rgb.iter())
                        .map(|(a, b)| (a - b).powi(2))
                        .sum::<f64>()
                        .sqrt()
                })
                .sum::<f64>()
                / (stats.len() - 1) as f64
        };

        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        let color_score = if avg_white > 50.0 {
            issues.push(format!("평균 흰색 비율이 높음 ({avg_white:.1}%)"));
            suggestions.push("캐릭터 색상이 제대로 생성되지 않음".into());
            3.0
        } else if avg_white > 20.0 {
            issues.push(format!("흰색 비율이 다소 높음 ({avg_white:.1}%)"));
            6.0
        } else {
            8.0
        };

        let consistency_score = if white_var > 20.0 {
            issues.push("프레임 간 일관성 부족".into());
            4.0
        } else if white_var > 10.0 {
            6.0
        } else {
            8.0
        };

        let motion_score = if rgb_drift < 5.0 {
            issues.push("모션이 거의 없음 (정적인 영상)".into());
            5.0
        } else if rgb_drift > 50.0 {
            issues.push("모션이 너무 급격함".into());
            5.0
        } else {
            8.0
        };

        let overall: f64 = (color_score + consistency_score + motion_score) / 3.0;
        let mut sub_scores = Map::new();
        sub_scores.insert("color_stability".into(), json!(color_score));
        sub_scores.insert("frame_consistency".into(), json!(consistency_score));
        sub_scores.insert("motion".into(), json!(motion_score));

        Ok(QualityReport {
            overall_score: (overall * 10.0).round() / 10.0,
            sub_scores,
            issues,
            suggestions,
            summary: format!(
                "전체 점수 {overall:.1}/10, 평균 흰색 {avg_white:.1}%, RGB 변화량 {rgb_drift:.1}"
            ),
            verdict: None,
        })
    }
}

/// Vision-model checker: strict identity consistency against a reference.
pub struct VisionQualityChecker {
    vision: Arc<dyn Vision>,
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
}

impl VisionQualityChecker {
    pub fn new(vision: Arc<dyn Vision>, runner: Arc<dyn CommandRunner>, ffmpeg: &str) -> Self {
        Self {
            vision,
            runner,
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Checks a video against the reference image using `frame_count`
    /// sampled frames.
    pub async fn check_video(
        &self,
        reference_b64: &str,
        video_path: &Path,
        frame_count: usize,
    ) -> Result<QualityVerdict, AdapterError> {
        let frames =
            extract_frames_b64(&self.runner, &self.ffmpeg, video_path, frame_count).await?;
        self.vision.quality_check(reference_b64, &frames, true).await
    }

    pub fn verdict_report(verdict: &QualityVerdict) -> QualityReport {
        QualityReport {
            overall_score: verdict.score,
            sub_scores: Map::new(),
            issues: Vec::new(),
            suggestions: Vec::new(),
            summary: format!(
                "캐릭터 일관성 {}점 ({})",
                verdict.score,
                verdict.verdict.as_str()
            ),
            verdict: Some(verdict.verdict.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> RawFrame {
        let pixels = (width * height) as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        RawFrame {
            width,
            height,
            rgb: data,
        }
    }

    #[test]
    fn white_frame_has_full_white_ratio() {
        let stats = frame_stats(&solid_frame(8, 8, [255, 255, 255]));
        assert!((stats.white_ratio - 100.0).abs() < f64::EPSILON);
        assert_eq!(stats.black_ratio, 0.0);
        assert!(stats.color_std < 1.0);
    }

    #[test]
    fn black_frame_has_full_black_ratio() {
        let stats = frame_stats(&solid_frame(8, 8, [0, 0, 0]));
        assert!((stats.black_ratio - 100.0).abs() < f64::EPSILON);
        assert_eq!(stats.white_ratio, 0.0);
    }

    #[test]
    fn mixed_frame_has_color_spread() {
        let mut frame = solid_frame(2, 1, [0, 0, 0]);
        frame.rgb[3..6].copy_from_slice(&[255, 255, 255]);
        let stats = frame_stats(&frame);
        assert!((stats.white_ratio - 50.0).abs() < f64::EPSILON);
        assert!((stats.black_ratio - 50.0).abs() < f64::EPSILON);
        assert!(stats.color_std > 100.0);
    }

    #[test]
    fn truncated_buffer_is_zeroed_not_panicking() {
        let frame = RawFrame {
            width: 10,
            height: 10,
            rgb: vec![0; 5],
        };
        let stats = frame_stats(&frame);
        assert_eq!(stats.white_ratio, 0.0);
    }
}
