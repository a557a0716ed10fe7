//! Streaming contract: progress events in emission order exactly once,
//! followed by one `result` and a terminal `done`.

mod mocks;

use futures::StreamExt;

#[tokio::test]
async fn stream_yields_progress_then_result_then_done() {
    let h = mocks::harness();
    h.orchestrator
        .start_workflow("경제 채널", Some("stream-run".into()))
        .await
        .unwrap();

    // Free-text feedback regenerates channel names, which emits progress.
    let mut stream = h
        .orchestrator
        .process_message_stream("stream-run", "더 짧은 이름으로 부탁해요", &[])
        .await;

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }

    let types: Vec<String> = events
        .iter()
        .map(|e| e["type"].as_str().unwrap_or("").to_string())
        .collect();

    assert!(types.contains(&"progress".to_string()), "{types:?}");
    assert_eq!(types.iter().filter(|t| *t == "result").count(), 1);
    assert_eq!(types.last().map(String::as_str), Some("done"));

    // The result event carries the final response payload.
    let result = events
        .iter()
        .find(|e| e["type"] == "result")
        .expect("result event");
    assert_eq!(result["data"]["session_id"], "stream-run");

    // Envelope: monotonically increasing event ids, constant session/run.
    let mut last_id = 0;
    let run_id = events[0]["run_id"].as_str().unwrap().to_string();
    for event in &events {
        let id = event["event_id"].as_u64().unwrap();
        assert!(id > last_id, "event ids must increase: {events:?}");
        last_id = id;
        assert_eq!(event["session_id"], "stream-run");
        assert_eq!(event["run_id"].as_str().unwrap(), run_id);
    }
}

#[tokio::test]
async fn each_run_starts_its_progress_log_fresh() {
    let h = mocks::harness();
    h.orchestrator
        .start_workflow("경제 채널", Some("fresh-run".into()))
        .await
        .unwrap();

    let first: Vec<_> = h
        .orchestrator
        .process_message_stream("fresh-run", "이름 다시 뽑아줘", &[])
        .await
        .collect()
        .await;
    let second: Vec<_> = h
        .orchestrator
        .process_message_stream("fresh-run", "또 다시 뽑아줘", &[])
        .await
        .collect()
        .await;

    let progress_count = |events: &[serde_json::Value]| {
        events.iter().filter(|e| e["type"] == "progress").count()
    };
    // The second run re-emits only its own events, not the first run's.
    assert_eq!(progress_count(&first), progress_count(&second));
}
