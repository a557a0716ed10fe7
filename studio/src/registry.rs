//! Dependency registry: every adapter and shared component, constructed
//! once at process startup and handed to the orchestrator. Tests build one
//! from mocks.

use std::sync::Arc;

use crate::adapters::{
    CommandRunner, HttpDownloader, HttpTts, HttpVision, HttpWorkflowEngine, Llm, ProcessRunner,
    TtsClient, Vision, WorkflowEngine,
};
use crate::benchmark::BenchmarkCache;
use crate::paths::PathPolicy;
use crate::progress::ProgressBus;
use crate::prompts::PromptSet;
use crate::providers::ProviderRouter;
use crate::quota::{QuotaLimits, QuotaManager};
use crate::screenshot::{ChannelCapture, DisabledCapture};
use crate::youtube::YouTubeService;

/// All shared dependencies. Cheap to clone; everything inside is `Arc`ed.
#[derive(Clone)]
pub struct Registry {
    pub llm: Arc<dyn Llm>,
    pub vision: Arc<dyn Vision>,
    pub engine: Arc<dyn WorkflowEngine>,
    pub tts: Arc<dyn TtsClient>,
    pub runner: Arc<dyn CommandRunner>,
    pub capture: Arc<dyn ChannelCapture>,
    pub youtube: Arc<YouTubeService>,
    pub quota: Arc<QuotaManager>,
    pub cache: Arc<BenchmarkCache>,
    pub bus: ProgressBus,
    pub paths: Arc<PathPolicy>,
    pub prompts: Arc<PromptSet>,
    /// Engine input directory for reference uploads; empty when the engine
    /// is remote and references must travel inline.
    pub engine_input_dir: Option<std::path::PathBuf>,
    /// Binaries for the media tools.
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    /// Default preset speaker for voiceover.
    pub tts_default_speaker: String,
}

impl Registry {
    /// Production wiring from environment settings.
    pub fn from_settings(settings: &env_config::Settings) -> Self {
        let paths = Arc::new(PathPolicy::new(&settings.data_dir));
        let quota = Arc::new(QuotaManager::new(paths.quota_file(), QuotaLimits::default()));
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
        let downloader = Arc::new(HttpDownloader::new());
        let youtube = Arc::new(YouTubeService::new(
            runner.clone(),
            downloader,
            &settings.ytdlp_bin,
            &settings.ffmpeg_bin,
        ));
        let engine_output_dir = (!settings.engine_output_dir.is_empty())
            .then(|| std::path::PathBuf::from(&settings.engine_output_dir));
        let engine_input_dir = (!settings.engine_input_dir.is_empty())
            .then(|| std::path::PathBuf::from(&settings.engine_input_dir));

        Self {
            llm: Arc::new(ProviderRouter::from_settings(settings, quota.clone())),
            vision: Arc::new(HttpVision::new(
                &settings.vision_api_url,
                &settings.vision_model,
            )),
            engine: Arc::new(HttpWorkflowEngine::new(
                &settings.engine_url,
                engine_output_dir,
            )),
            tts: Arc::new(HttpTts::new(
                &settings.tts_preset_url,
                &settings.tts_clone_url,
            )),
            runner,
            capture: Arc::new(DisabledCapture),
            youtube,
            quota,
            cache: Arc::new(BenchmarkCache::new(paths.benchmark_cache_dir())),
            bus: ProgressBus::new(),
            paths,
            prompts: Arc::new(PromptSet::load()),
            engine_input_dir,
            ffmpeg_bin: settings.ffmpeg_bin.clone(),
            ffprobe_bin: settings.ffprobe_bin.clone(),
            tts_default_speaker: settings.tts_default_speaker.clone(),
        }
    }
}
