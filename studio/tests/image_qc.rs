//! ImageGenerator QC loop: a failing verdict regenerates the clip until the
//! attempt budget is spent, and the per-scene record keeps the count.

mod mocks;

use serde_json::json;
use studio::adapters::Verdict;
use studio::agent::image_generator::ImageGeneratorAgent;
use studio::agent::Agent;
use studio::context::{keys, SessionContext};
use studio::PathPolicy;
use std::sync::Arc;

fn scene_prompts(n: usize) -> serde_json::Value {
    json!((1..=n)
        .map(|i| json!({
            "line_num": i,
            "script_line": format!("장면 {i} 대사입니다."),
            "image_prompt": format!("scene {i} image"),
            "video_prompt": format!("scene {i} motion"),
        }))
        .collect::<Vec<_>>())
}

fn agent_with_verdicts(
    verdicts: Vec<Verdict>,
    data_dir: &tempfile::TempDir,
) -> (ImageGeneratorAgent, Arc<mocks::ScriptedEngine>, Arc<mocks::ScriptedVision>) {
    let engine = mocks::ScriptedEngine::new();
    let vision = mocks::ScriptedVision::with_verdicts(verdicts);
    let runner: Arc<dyn studio::adapters::CommandRunner> = Arc::new(mocks::ScriptedRunner);
    let agent = ImageGeneratorAgent::new(
        engine.clone(),
        vision.clone(),
        runner,
        "ffmpeg",
        Arc::new(PathPolicy::new(data_dir.path())),
        None,
        studio::ProgressHandle::detached(),
    );
    (agent, engine, vision)
}

#[tokio::test]
async fn fail_fail_pass_yields_regeneration_count_two() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, _engine, _vision) =
        agent_with_verdicts(vec![Verdict::Fail, Verdict::Fail, Verdict::Pass], &dir);

    let mut input = SessionContext::new();
    input.set(keys::SESSION_ID, json!("qc-test"));
    input.set("prompts", scene_prompts(1));
    input.set("generate_videos", json!(true));
    input.set("enable_qc", json!(true));
    input.set("max_regenerations", json!(2));

    let result = agent.execute(&input).await.unwrap();
    assert!(result.success);

    let videos = result.data["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["qc_verdict"], "PASS");
    assert_eq!(videos[0]["regeneration_count"], 2);

    let qc = result.data["qc_results"].as_array().unwrap();
    assert_eq!(qc[0]["verdict"], "PASS");
    assert_eq!(qc[0]["regeneration_count"], 2);
}

#[tokio::test]
async fn persistent_fail_stops_at_the_budget() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, _engine, vision) = agent_with_verdicts(
        vec![Verdict::Fail, Verdict::Fail, Verdict::Fail, Verdict::Fail],
        &dir,
    );

    let mut input = SessionContext::new();
    input.set(keys::SESSION_ID, json!("qc-budget"));
    input.set("prompts", scene_prompts(1));
    input.set("generate_videos", json!(true));
    input.set("enable_qc", json!(true));
    input.set("max_regenerations", json!(2));

    let result = agent.execute(&input).await.unwrap();
    let videos = result.data["videos"].as_array().unwrap();
    assert_eq!(videos[0]["qc_verdict"], "FAIL");
    assert_eq!(videos[0]["regeneration_count"], 2);
    // Initial attempt plus two regenerations → three QC calls.
    assert_eq!(vision.call_count(), 3);
}

#[tokio::test]
async fn qc_disabled_accepts_first_video() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, engine, vision) = agent_with_verdicts(vec![Verdict::Fail], &dir);

    let mut input = SessionContext::new();
    input.set(keys::SESSION_ID, json!("qc-off"));
    input.set("prompts", scene_prompts(2));
    input.set("generate_videos", json!(true));
    input.set("enable_qc", json!(false));

    let result = agent.execute(&input).await.unwrap();
    let videos = result.data["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 2);
    assert_eq!(vision.call_count(), 0);
    // Two images plus two videos.
    assert_eq!(engine.execution_count(), 4);
}
