//! Composer behavior over a scripted transcoder: per-scene sync, subtitle
//! generation, and cleanup of intermediates on success.

mod mocks;

use serde_json::json;
use studio::agent::composer::ComposerAgent;
use studio::agent::Agent;
use studio::context::{keys, SessionContext};
use studio::PathPolicy;
use std::sync::Arc;

fn compose_input(dir: &std::path::Path, scenes: usize) -> SessionContext {
    let mut videos = Vec::new();
    let mut audios = Vec::new();
    let mut prompts = Vec::new();
    for i in 1..=scenes {
        let video = dir.join(format!("scene_{i:03}.mp4"));
        let audio = dir.join(format!("voice_{i}.wav"));
        std::fs::write(&video, b"VIDEO").unwrap();
        std::fs::write(&audio, b"AUDIO").unwrap();
        videos.push(json!({"video_path": video.display().to_string()}));
        audios.push(json!({"filepath": audio.display().to_string()}));
        prompts.push(json!({"script_line": format!("장면 {i}의 대사입니다.")}));
    }

    let mut input = SessionContext::new();
    input.set(keys::SESSION_ID, json!("compose-test"));
    input.set("videos", json!(videos));
    input.set("audios", json!(audios));
    input.set("prompts", json!(prompts));
    input
}

fn composer(data_dir: &tempfile::TempDir) -> ComposerAgent {
    let runner: Arc<dyn studio::adapters::CommandRunner> = Arc::new(mocks::ScriptedRunner);
    ComposerAgent::new(
        runner,
        Arc::new(PathPolicy::new(data_dir.path())),
        studio::ProgressHandle::detached(),
        "ffmpeg",
        "ffprobe",
    )
}

#[tokio::test]
async fn compose_produces_final_video_and_srt() {
    let data_dir = tempfile::tempdir().unwrap();
    let media_dir = tempfile::tempdir().unwrap();
    let mut agent = composer(&data_dir);

    let input = compose_input(media_dir.path(), 2);
    let result = agent.execute(&input).await.unwrap();

    assert!(result.success, "{}", result.message);
    assert!(result.needs_feedback);
    let final_video = result.data[keys::FINAL_VIDEO].as_str().unwrap();
    let subtitle = result.data[keys::SUBTITLE_FILE].as_str().unwrap();
    assert!(std::path::Path::new(final_video).exists());

    // Cumulative 3-second scenes in the subtitle track.
    let srt = std::fs::read_to_string(subtitle).unwrap();
    assert!(srt.contains("00:00:00,000 --> 00:00:03,000"));
    assert!(srt.contains("00:00:03,000 --> 00:00:06,000"));
    assert!(srt.contains("장면 2의 대사입니다."));

    // Intermediates are cleaned on success.
    let out_dir = std::path::Path::new(final_video).parent().unwrap();
    let leftovers: Vec<_> = std::fs::read_dir(out_dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.starts_with("adjusted_") || n.starts_with("concat_"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");

    let confirmed = agent.handle_feedback("확인", &[]).await.unwrap();
    assert_eq!(confirmed.step, "compose_confirmed");
    assert!(!confirmed.needs_feedback);
}

#[tokio::test]
async fn missing_inputs_abort_with_structured_error() {
    let data_dir = tempfile::tempdir().unwrap();
    let mut agent = composer(&data_dir);

    let mut input = SessionContext::new();
    input.set(keys::SESSION_ID, json!("compose-empty"));
    input.set("videos", json!([]));
    input.set("audios", json!([]));

    let result = agent.execute(&input).await.unwrap();
    assert!(!result.success);
    assert!(result.data.contains_key("error"));
}
