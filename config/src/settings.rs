//! Typed service settings read from the environment.
//!
//! Every external service URL, credential and model identifier lives here
//! with a documented default; nothing is embedded elsewhere in the tree.
//! Call [`crate::load_and_apply`] first so `.env` / XDG values are visible.

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Credentials and model for one remote chat provider. `api_key` empty means
/// the provider is not configured and is excluded from the router chain.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ProviderSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All external endpoints and tunables, resolved once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Root for all persistent data (sessions DB, caches, outputs).
    pub data_dir: String,

    // LLM providers, tried in this order; local vLLM is the unlimited fallback.
    pub groq: ProviderSettings,
    pub openrouter: ProviderSettings,
    pub gemini: ProviderSettings,
    pub local_llm_base_url: String,
    pub local_llm_model: String,

    // Vision model (OpenAI-compatible multimodal chat).
    pub vision_api_url: String,
    pub vision_model: String,

    // Workflow engine (node-graph image/video generation).
    pub engine_url: String,
    /// Local mount of the engine's output dir; empty disables post-fetch cleanup.
    pub engine_output_dir: String,
    /// Local mount of the engine's input dir for reference uploads.
    pub engine_input_dir: String,

    // TTS servers: preset speaker endpoint and cloning endpoint.
    pub tts_preset_url: String,
    pub tts_clone_url: String,
    pub tts_default_speaker: String,

    // Media tools.
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub ytdlp_bin: String,
}

impl Settings {
    /// Reads every setting from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            data_dir: env_or("STUDIO_DATA_DIR", "./data"),
            groq: ProviderSettings {
                api_key: env_or("GROQ_API_KEY", ""),
                base_url: env_or("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
                model: env_or("GROQ_MODEL", "llama-3.3-70b-versatile"),
            },
            openrouter: ProviderSettings {
                api_key: env_or("OPENROUTER_API_KEY", ""),
                base_url: env_or("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
                model: env_or("OPENROUTER_MODEL", "meta-llama/llama-3.3-70b-instruct"),
            },
            gemini: ProviderSettings {
                api_key: env_or("GEMINI_API_KEY", ""),
                base_url: env_or(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta/openai",
                ),
                model: env_or("GEMINI_MODEL", "gemini-2.0-flash"),
            },
            local_llm_base_url: env_or("VLLM_BASE_URL", "http://localhost:8017/v1"),
            local_llm_model: env_or("VLLM_MODEL", "gpt-oss-120b"),
            vision_api_url: env_or("VISION_API_URL", "http://localhost:8016/v1"),
            vision_model: env_or("VISION_MODEL", "qwen3-vl-30b"),
            engine_url: env_or("ENGINE_URL", "http://localhost:8188"),
            engine_output_dir: env_or("ENGINE_OUTPUT_DIR", ""),
            engine_input_dir: env_or("ENGINE_INPUT_DIR", ""),
            tts_preset_url: env_or("TTS_PRESET_URL", "http://localhost:8311"),
            tts_clone_url: env_or("TTS_CLONE_URL", "http://localhost:8310"),
            tts_default_speaker: env_or("TTS_DEFAULT_SPEAKER", "Sohee"),
            ffmpeg_bin: env_or("FFMPEG_BIN", "ffmpeg"),
            ffprobe_bin: env_or("FFPROBE_BIN", "ffprobe"),
            ytdlp_bin: env_or("YTDLP_BIN", "yt-dlp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        std::env::remove_var("TTS_DEFAULT_SPEAKER");
        let s = Settings::from_env();
        assert_eq!(s.tts_default_speaker, "Sohee");
        assert_eq!(s.ffmpeg_bin, "ffmpeg");
    }

    #[test]
    fn provider_without_key_is_unconfigured() {
        let p = ProviderSettings {
            api_key: String::new(),
            base_url: "http://x".into(),
            model: "m".into(),
        };
        assert!(!p.is_configured());
    }
}
