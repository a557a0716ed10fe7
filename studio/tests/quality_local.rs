//! Local (pixel-statistics) quality checker over a scripted transcoder.

mod mocks;

use std::sync::Arc;

use studio::adapters::CommandRunner;
use studio::agent::quality::LocalQualityChecker;

fn checker() -> LocalQualityChecker {
    let runner: Arc<dyn CommandRunner> = Arc::new(mocks::ScriptedRunner);
    LocalQualityChecker::new(runner, "ffmpeg", "ffprobe")
}

#[tokio::test]
async fn all_white_image_scores_low_composition() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("white.png");
    std::fs::write(&image, b"PNG").unwrap();

    // The scripted transcoder decodes everything to solid white 4x4 frames.
    let report = checker().analyze_image(&image).await.unwrap();

    assert!(report.overall_score < 6.0, "{report:?}");
    assert!(report
        .issues
        .iter()
        .any(|i| i.contains("흰색 비율")));
    assert!(report.sub_scores.contains_key("composition"));
    assert!(report.verdict.is_none());
    assert!(report.summary.contains("전체 점수"));
}

#[tokio::test]
async fn video_report_has_uniform_shape() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, b"MP4").unwrap();

    let report = checker().analyze_video(&video).await.unwrap();
    let value = report.to_value();
    for key in ["overall_score", "sub_scores", "issues", "suggestions", "summary"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    // Identical frames: no motion is reported as an issue.
    assert!(report.issues.iter().any(|i| i.contains("모션")));
}
