//! Benchmark stage scenarios: cache hit with confirmation, and explicit
//! reanalysis invalidating the cached entry.

mod mocks;

use studio::benchmark::BenchmarkReport;
use studio::context::keys;

fn seeded_report() -> BenchmarkReport {
    BenchmarkReport {
        analyzed_channels: vec!["foo".into()],
        analyzed_videos_count: 7,
        channel_concept: "미리 저장된 경제 교육 채널 컨셉입니다".into(),
        ..Default::default()
    }
}

async fn reach_benchmarking(h: &mocks::TestHarness, session: &str) {
    h.orchestrator
        .start_workflow("경제 채널", Some(session.into()))
        .await
        .unwrap();
    let response = h
        .orchestrator
        .process_message(session, "1", &[])
        .await
        .unwrap();
    assert_eq!(response.current_stage, "benchmarking");
}

#[tokio::test]
async fn cached_channel_is_offered_without_new_analysis() {
    let h = mocks::harness();
    let urls = vec!["https://youtube.com/@foo".to_string()];
    h.cache.save(&urls, &seeded_report()).unwrap();

    reach_benchmarking(&h, "cache-run").await;
    let llm_before = h.llm.call_count();
    let vision_before = h.vision.call_count();

    let response = h
        .orchestrator
        .process_message("cache-run", "https://youtube.com/@foo", &[])
        .await
        .unwrap();
    assert_eq!(response.data["cached"], serde_json::json!(true));
    assert!(response.message.contains("이미 벤치마킹된 채널"));
    assert!(response.needs_feedback);

    // Confirming the cached report advances to CHARACTER with the report in
    // context; no model call was made anywhere in between.
    let confirmed = h
        .orchestrator
        .process_message("cache-run", "확인", &[])
        .await
        .unwrap();
    assert_eq!(confirmed.current_stage, "character");
    assert!(confirmed.context.contains(keys::BENCHMARK_REPORT));
    assert_eq!(h.llm.call_count(), llm_before);
    assert_eq!(h.vision.call_count(), vision_before);
}

#[tokio::test]
async fn reanalyze_deletes_cache_and_runs_fresh_analysis() {
    let h = mocks::harness();
    let urls = vec!["https://youtube.com/@foo".to_string()];
    h.cache.save(&urls, &seeded_report()).unwrap();

    reach_benchmarking(&h, "reanalyze-run").await;
    h.orchestrator
        .process_message("reanalyze-run", "https://youtube.com/@foo", &[])
        .await
        .unwrap();

    let llm_before = h.llm.call_count();
    let response = h
        .orchestrator
        .process_message("reanalyze-run", "다시 분석", &[])
        .await
        .unwrap();

    // Fresh analysis ran: model calls happened and a new report was shown.
    assert!(h.llm.call_count() > llm_before, "expected fresh LLM analysis");
    assert!(response.message.contains("벤치마크 리포트"));
    assert!(response.needs_feedback);

    // The regenerated entry replaced the seeded one.
    let entry = h.cache.find("https://youtube.com/@foo").unwrap();
    assert_ne!(entry.report, seeded_report());
    assert_eq!(entry.report.analyzed_channels, vec!["테스트 채널"]);
}

#[tokio::test]
async fn consecutive_confirms_after_report_do_not_rerun_analysis() {
    let h = mocks::harness();
    reach_benchmarking(&h, "confirm-run").await;

    // Fresh analysis from a URL (no cache seeded).
    let report = h
        .orchestrator
        .process_message("confirm-run", "https://youtube.com/@bar", &[])
        .await
        .unwrap();
    // Channel identity confirmation, then analysis kickoff.
    assert!(report.message.contains("이 채널이 맞나요"));
    h.orchestrator
        .process_message("confirm-run", "확인", &[])
        .await
        .unwrap();
    let analyzed = h
        .orchestrator
        .process_message("confirm-run", "분석 시작", &[])
        .await
        .unwrap();
    assert!(analyzed.message.contains("벤치마크 리포트"));

    let saved_after_analysis = h.cache.find("https://youtube.com/@bar").unwrap();
    let advanced = h
        .orchestrator
        .process_message("confirm-run", "확인", &[])
        .await
        .unwrap();
    assert_eq!(advanced.current_stage, "character");

    // Further confirms land on the character agent; the benchmarker never
    // re-runs, so the cached entry is untouched.
    let again = h
        .orchestrator
        .process_message("confirm-run", "확인", &[])
        .await
        .unwrap();
    assert_eq!(again.current_stage, "character");
    let entry = h.cache.find("https://youtube.com/@bar").unwrap();
    assert_eq!(entry.updated_at, saved_after_analysis.updated_at);
}
