//! Shared mock adapters for integration tests: scripted LLM/vision/engine/
//! TTS/subprocess implementations plus a registry builder around them.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use studio::adapters::{
    AdapterError, ChatOptions, CommandOutput, CommandRunner, HttpDownloader, Llm, QualityVerdict,
    TtsClient, Verdict, Vision, WorkflowEngine,
};
use studio::adapters::{ArtStyle, JobStatus};
use studio::benchmark::BenchmarkCache;
use studio::message::ChatMessage;
use studio::progress::ProgressBus;
use studio::prompts::PromptSet;
use studio::quota::{QuotaLimits, QuotaManager};
use studio::screenshot::DisabledCapture;
use studio::workflows::WorkflowSpec;
use studio::youtube::YouTubeService;
use studio::{InMemorySessionStore, Orchestrator, PathPolicy, Registry};

/// LLM answering by prompt shape; counts calls.
pub struct ScriptedLlm {
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _opts: ChatOptions,
    ) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if prompt.contains("채널명") && prompt.contains("channel_names") {
            return Ok(r#"{"channel_names": ["알파", "베타", "감마"], "reasoning": "test"}"#.into());
        }
        if prompt.contains("아이디어") && prompt.contains("ideas") {
            return Ok(
                r#"{"ideas": [{"title": "첫 아이디어", "hook": "훅1", "summary": "s1"},
                              {"title": "둘째 아이디어", "hook": "훅2", "summary": "s2"}]}"#
                    .into(),
            );
        }
        if prompt.contains("대본") && prompt.contains("opening") {
            return Ok(
                r#"{"script": {"opening": "오프닝 문장이 충분히 깁니다 정말로요.",
                               "intro": "인트로 문장이 충분히 깁니다 확실히요.",
                               "conclusion": "결론 문장이 충분히 깁니다 진짜로요."},
                     "estimated_duration": "5분"}"#
                    .into(),
            );
        }
        if prompt.contains("image_prompt") && prompt.contains("video_prompt") {
            return Ok(
                r#"{"image_prompt": "a character", "video_prompt": "subtle motion",
                     "expression": "웃음", "props": []}"#
                    .into(),
            );
        }
        // Analysis prompts and replication sections: a generic object.
        Ok(r#"{"summary": "분석 요약", "channel_concept": "테스트 컨셉"}"#.into())
    }
}

/// Vision with a scripted QC verdict sequence (defaults to PASS).
pub struct ScriptedVision {
    pub verdicts: Mutex<Vec<Verdict>>,
    pub calls: AtomicUsize,
}

impl ScriptedVision {
    pub fn new() -> Arc<Self> {
        Self::with_verdicts(vec![])
    }

    pub fn with_verdicts(verdicts: Vec<Verdict>) -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::new(verdicts),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Vision for ScriptedVision {
    async fn analyze_image(
        &self,
        _image_b64: &str,
        _prompt: &str,
    ) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(r#"{"summary": "썸네일 요약", "color_palette": ["red"]}"#.into())
    }

    async fn analyze_style(&self, _image_b64: &str) -> Result<ArtStyle, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ArtStyle::Cartoon)
    }

    async fn describe_character(
        &self,
        _image_b64: &str,
    ) -> Result<Map<String, Value>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut map = Map::new();
        map.insert("character_type".into(), json!("animal"));
        map.insert("expression".into(), json!("밝은"));
        Ok(map)
    }

    async fn quality_check(
        &self,
        _reference_b64: &str,
        _frames_b64: &[String],
        _strict: bool,
    ) -> Result<QualityVerdict, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let verdict = {
            let mut queue = self.verdicts.lock().unwrap();
            if queue.is_empty() {
                Verdict::Pass
            } else {
                queue.remove(0)
            }
        };
        Ok(QualityVerdict {
            score: if verdict == Verdict::Pass { 9.0 } else { 3.0 },
            verdict,
        })
    }
}

/// Engine returning one base64 output per execution.
pub struct ScriptedEngine {
    pub executions: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            executions: AtomicUsize::new(0),
        })
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkflowEngine for ScriptedEngine {
    async fn submit(&self, _workflow: &WorkflowSpec) -> Result<String, AdapterError> {
        Ok("job-1".into())
    }

    async fn poll(&self, _handle: &str) -> Result<JobStatus, AdapterError> {
        Ok(JobStatus::Done { outputs: vec![] })
    }

    async fn fetch_outputs(&self, _handle: &str) -> Result<Vec<String>, AdapterError> {
        Ok(vec!["data:image/png;base64,QUJD".into()])
    }

    async fn execute(
        &self,
        _workflow: &WorkflowSpec,
        _timeout: Duration,
    ) -> Result<Vec<String>, AdapterError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(vec!["data:image/png;base64,QUJD".into()])
    }
}

pub struct ScriptedTts;

#[async_trait]
impl TtsClient for ScriptedTts {
    async fn synthesize_preset(
        &self,
        _text: &str,
        _speaker: &str,
        _language: &str,
    ) -> Result<Vec<u8>, AdapterError> {
        Ok(vec![0u8; 16])
    }

    async fn synthesize_clone(
        &self,
        _text: &str,
        _ref_audio_b64: &str,
        _ref_text: Option<&str>,
    ) -> Result<Vec<u8>, AdapterError> {
        Ok(vec![1u8; 16])
    }
}

/// Runner scripting the media tools: duration/dimension probes, frame
/// extraction (writes PNG files), rawvideo decode, downloader JSON dumps.
pub struct ScriptedRunner;

fn ok_output(stdout: Vec<u8>) -> CommandOutput {
    CommandOutput {
        stdout,
        stderr: Vec::new(),
        exit_code: 0,
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        argv: &[String],
        _cwd: Option<&Path>,
        _timeout: Duration,
    ) -> Result<CommandOutput, AdapterError> {
        let program = argv.first().map(String::as_str).unwrap_or("");
        let args = &argv[1..];

        if program.contains("ffprobe") {
            if args.iter().any(|a| a.contains("format=duration")) {
                return Ok(ok_output(b"3.0\n".to_vec()));
            }
            if args.iter().any(|a| a.contains("width,height")) {
                return Ok(ok_output(b"4x4\n".to_vec()));
            }
            return Ok(ok_output(Vec::new()));
        }

        if program.contains("ffmpeg") {
            // Frame extraction to a PNG pattern: write the files.
            if let Some(pattern) = args.iter().find(|a| a.ends_with("frame_%03d.png")) {
                let dir = Path::new(pattern).parent().unwrap();
                for i in 1..=4 {
                    std::fs::write(dir.join(format!("frame_{i:03}.png")), b"PNG").ok();
                }
                return Ok(ok_output(Vec::new()));
            }
            // Raw RGB24 decode: 4x4 white frames.
            if args.iter().any(|a| a == "rawvideo") {
                return Ok(ok_output(vec![255u8; 4 * 4 * 3 * 2]));
            }
            // Everything else writes its output file (last argument).
            if let Some(output) = args.last() {
                if output.contains('.') && !output.starts_with('-') {
                    std::fs::write(output, b"MEDIA").ok();
                }
            }
            return Ok(ok_output(Vec::new()));
        }

        if program.contains("yt-dlp") {
            if args.iter().any(|a| a == "--flat-playlist") {
                let lines = (1..=3)
                    .map(|i| {
                        json!({
                            "id": format!("vid{i}"),
                            "title": format!("테스트 영상 {i}"),
                            "view_count": 1000 * i,
                            "duration": 300,
                            "upload_date": "20250101",
                        })
                        .to_string()
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                return Ok(ok_output(lines.into_bytes()));
            }
            if args.iter().any(|a| a == "--dump-json") {
                let data = json!({
                    "id": "vid1",
                    "title": "테스트 영상 1",
                    "channel": "테스트 채널",
                    "channel_id": "UCtest",
                    "channel_follower_count": 1234,
                    "channel_description": "테스트 채널 설명",
                });
                return Ok(ok_output(data.to_string().into_bytes()));
            }
            // Subtitle / audio download modes: succeed without files.
            return Ok(ok_output(Vec::new()));
        }

        Ok(ok_output(Vec::new()))
    }
}

/// Everything a test needs: the orchestrator plus handles to the mocks.
pub struct TestHarness {
    pub orchestrator: Arc<Orchestrator>,
    pub llm: Arc<ScriptedLlm>,
    pub vision: Arc<ScriptedVision>,
    pub engine: Arc<ScriptedEngine>,
    pub cache: Arc<BenchmarkCache>,
    pub bus: ProgressBus,
    pub data_dir: tempfile::TempDir,
}

pub fn harness() -> TestHarness {
    harness_with_verdicts(vec![])
}

pub fn harness_with_verdicts(verdicts: Vec<Verdict>) -> TestHarness {
    let data_dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(PathPolicy::new(data_dir.path()));
    let llm = ScriptedLlm::new();
    let vision = ScriptedVision::with_verdicts(verdicts);
    let engine = ScriptedEngine::new();
    let runner: Arc<dyn CommandRunner> = Arc::new(ScriptedRunner);
    let cache = Arc::new(BenchmarkCache::new(paths.benchmark_cache_dir()));
    let bus = ProgressBus::new();

    let registry = Registry {
        llm: llm.clone(),
        vision: vision.clone(),
        engine: engine.clone(),
        tts: Arc::new(ScriptedTts),
        runner: runner.clone(),
        capture: Arc::new(DisabledCapture),
        youtube: Arc::new(YouTubeService::new(
            runner,
            Arc::new(HttpDownloader::new()),
            "yt-dlp",
            "ffmpeg",
        )),
        quota: Arc::new(QuotaManager::new(
            paths.quota_file(),
            QuotaLimits::default(),
        )),
        cache: cache.clone(),
        bus: bus.clone(),
        paths,
        prompts: Arc::new(PromptSet::default()),
        engine_input_dir: None,
        ffmpeg_bin: "ffmpeg".into(),
        ffprobe_bin: "ffprobe".into(),
        tts_default_speaker: "Sohee".into(),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        Arc::new(InMemorySessionStore::new()),
    ));

    TestHarness {
        orchestrator,
        llm,
        vision,
        engine,
        cache,
        bus,
        data_dir,
    }
}
