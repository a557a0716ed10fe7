//! End-to-end orchestrator scenarios over mock adapters: skip-through,
//! channel name selection, stage monotonicity, and input boundary behavior.

mod mocks;

use studio::context::keys;
use studio::Stage;

#[tokio::test]
async fn skip_through_workflow_reaches_completed() {
    let h = mocks::harness();
    let start = h
        .orchestrator
        .start_workflow("quick run", Some("skip-run".into()))
        .await
        .unwrap();
    assert_eq!(start.current_stage, "channel_name");
    assert!(start.needs_feedback);

    let mut stages = vec![Stage::parse(&start.current_stage).unwrap()];
    for _ in 0..20 {
        let response = h
            .orchestrator
            .process_message("skip-run", "스킵", &[])
            .await
            .unwrap();
        let stage = Stage::parse(&response.current_stage).unwrap();
        stages.push(stage);
        if stage == Stage::Completed {
            break;
        }
    }

    // Monotone, ends at completed, and each skip advanced at most one stage.
    assert_eq!(*stages.last().unwrap(), Stage::Completed);
    let positions: Vec<usize> = stages
        .iter()
        .map(|s| Stage::ORDER.iter().position(|o| o == s).unwrap())
        .collect();
    for pair in positions.windows(2) {
        assert!(pair[1] >= pair[0], "stage went backwards: {positions:?}");
        assert!(pair[1] - pair[0] <= 1, "stage jumped: {positions:?}");
    }

    // A skipped-through run leaves no stage outputs behind.
    let session = h
        .orchestrator
        .get_session("skip-run")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.context.get_str(keys::USER_REQUEST), Some("quick run"));
    for key in [
        keys::CHANNEL_NAMES,
        keys::SELECTED_CHANNEL_NAME,
        keys::BENCHMARK_REPORT,
        keys::CHARACTER_IMAGE,
        keys::SELECTED_VIDEO_IDEA,
        keys::SCRIPT,
        keys::IMAGE_PROMPTS,
        keys::GENERATED_IMAGES,
        keys::GENERATED_VIDEOS,
        keys::VOICE_SECTIONS,
        keys::FINAL_VIDEO,
    ] {
        assert!(
            !session.context.contains(key),
            "unexpected context key after skip run: {key}"
        );
    }
}

#[tokio::test]
async fn channel_name_selection_advances_to_benchmarking() {
    let h = mocks::harness();
    let start = h
        .orchestrator
        .start_workflow("경제 채널 만들어줘", Some("select-run".into()))
        .await
        .unwrap();
    assert_eq!(
        start.context.get_array(keys::CHANNEL_NAMES).unwrap().len(),
        3
    );

    let response = h
        .orchestrator
        .process_message("select-run", "2", &[])
        .await
        .unwrap();
    assert_eq!(response.current_stage, "benchmarking");
    assert_eq!(
        response.context.get_str(keys::SELECTED_CHANNEL_NAME),
        Some("베타")
    );
    assert!(response.needs_feedback);
}

#[tokio::test]
async fn out_of_range_selection_reprompts_without_advancing() {
    let h = mocks::harness();
    h.orchestrator
        .start_workflow("경제 채널", Some("range-run".into()))
        .await
        .unwrap();

    let response = h
        .orchestrator
        .process_message("range-run", "7", &[])
        .await
        .unwrap();
    assert_eq!(response.current_stage, "channel_name");
    assert!(response.needs_feedback);
    assert!(!response.context.contains(keys::SELECTED_CHANNEL_NAME));
}

#[tokio::test]
async fn empty_message_is_a_user_error_not_a_crash() {
    let h = mocks::harness();
    h.orchestrator
        .start_workflow("채널", Some("empty-run".into()))
        .await
        .unwrap();

    let response = h
        .orchestrator
        .process_message("empty-run", "   ", &[])
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.current_stage, "channel_name");
}

#[tokio::test]
async fn selection_then_full_text_path_reaches_script() {
    let h = mocks::harness();
    h.orchestrator
        .start_workflow("경제 채널", Some("full-run".into()))
        .await
        .unwrap();

    // Channel chosen → benchmarking; skip it.
    h.orchestrator
        .process_message("full-run", "1", &[])
        .await
        .unwrap();
    h.orchestrator
        .process_message("full-run", "스킵", &[])
        .await
        .unwrap();

    // Character by text description, then confirm the generated image.
    let generated = h
        .orchestrator
        .process_message("full-run", "귀여운 곰 캐릭터로 해줘", &[])
        .await
        .unwrap();
    assert_eq!(generated.current_stage, "character");
    assert!(!generated.images.is_empty());

    let confirmed = h
        .orchestrator
        .process_message("full-run", "확정", &[])
        .await
        .unwrap();
    assert_eq!(confirmed.current_stage, "tts_settings");

    // Default voice → asked for a topic at video_ideas.
    let tts = h
        .orchestrator
        .process_message("full-run", "1", &[])
        .await
        .unwrap();
    assert_eq!(tts.current_stage, "video_ideas");

    // A topic generates ideas; selecting one writes the script.
    let ideas = h
        .orchestrator
        .process_message("full-run", "월급으로 재테크 시작하는 방법", &[])
        .await
        .unwrap();
    assert_eq!(ideas.current_stage, "video_ideas");
    assert!(ideas.context.get_array(keys::VIDEO_IDEAS).is_some());

    let script = h
        .orchestrator
        .process_message("full-run", "1", &[])
        .await
        .unwrap();
    assert_eq!(script.current_stage, "script");
    assert!(script.context.contains(keys::SCRIPT));
    assert_eq!(
        script.context.get(keys::SELECTED_VIDEO_IDEA).unwrap()["title"],
        "첫 아이디어"
    );
}

#[tokio::test]
async fn delete_session_removes_state_and_progress() {
    let h = mocks::harness();
    h.orchestrator
        .start_workflow("채널", Some("del-run".into()))
        .await
        .unwrap();

    let deleted = h.orchestrator.delete_session("del-run").await.unwrap();
    assert!(deleted.iter().any(|d| d == "session"));
    assert!(deleted.iter().any(|d| d == "agents"));
    assert!(h
        .orchestrator
        .get_session("del-run")
        .await
        .unwrap()
        .is_none());
}
