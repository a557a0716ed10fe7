//! LLM provider chain: ordered fallback across remote providers with
//! quotas, ending at an unlimited local server.
//!
//! The router is built once at startup by probing which providers have
//! credentials; missing credentials exclude a provider from the chain. Each
//! `chat` call walks the chain in priority order, skipping remote providers
//! whose quota is exhausted, and charges one use on success.

mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::adapters::{AdapterError, ChatOptions, Llm};
use crate::message::ChatMessage;
use crate::quota::QuotaManager;

/// One LLM backend addressable by the router.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Lower is tried first.
    fn priority(&self) -> u8;

    /// Local providers bypass quota checks and serve as the final fallback.
    fn is_local(&self) -> bool {
        false
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &ChatOptions,
    ) -> Result<String, AdapterError>;
}

/// Ordered fallback chain with quota enforcement.
pub struct ProviderRouter {
    providers: Vec<Arc<dyn ChatProvider>>,
    quota: Arc<QuotaManager>,
}

impl ProviderRouter {
    pub fn new(mut providers: Vec<Arc<dyn ChatProvider>>, quota: Arc<QuotaManager>) -> Self {
        providers.sort_by_key(|p| p.priority());
        info!(
            active = ?providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            "provider chain"
        );
        Self { providers, quota }
    }

    /// Builds the chain from settings, keeping only providers whose
    /// credentials are present. The local server is always included last.
    pub fn from_settings(settings: &env_config::Settings, quota: Arc<QuotaManager>) -> Self {
        let mut providers: Vec<Arc<dyn ChatProvider>> = Vec::new();

        for (name, priority, cfg) in [
            ("groq", 1, &settings.groq),
            ("openrouter", 2, &settings.openrouter),
            ("gemini", 3, &settings.gemini),
        ] {
            if cfg.is_configured() {
                providers.push(Arc::new(OpenAiCompatProvider::remote(
                    name,
                    priority,
                    &cfg.base_url,
                    &cfg.api_key,
                    &cfg.model,
                )));
            } else {
                warn!(provider = name, "not available (missing API key)");
            }
        }

        providers.push(Arc::new(OpenAiCompatProvider::local(
            "local_vllm",
            99,
            &settings.local_llm_base_url,
            &settings.local_llm_model,
        )));

        Self::new(providers, quota)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl Llm for ProviderRouter {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: ChatOptions,
    ) -> Result<String, AdapterError> {
        let mut last_error: Option<AdapterError> = None;

        for provider in &self.providers {
            let name = provider.name();
            if !provider.is_local() && !self.quota.can_use(name) {
                debug!(provider = name, "skipping (quota exhausted)");
                continue;
            }

            debug!(provider = name, "trying");
            match provider.chat(messages, &opts).await {
                Ok(text) => {
                    if !provider.is_local() {
                        self.quota.use_one(name);
                        let status = self.quota.status(name);
                        debug!(
                            provider = name,
                            remaining = status.remaining,
                            limit = status.limit,
                            "chat ok"
                        );
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!(provider = name, error = %e, "provider failed, falling through");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AdapterError::resource("no providers available")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        name: String,
        priority: u8,
        local: bool,
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &str, priority: u8, local: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                priority,
                local,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> u8 {
            self.priority
        }
        fn is_local(&self) -> bool {
            self.local
        }
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _opts: &ChatOptions,
        ) -> Result<String, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AdapterError::transient("boom"))
            } else {
                Ok(format!("answer from {}", self.name))
            }
        }
    }

    fn quota_with(dir: &tempfile::TempDir, exhausted: &str) -> Arc<QuotaManager> {
        let mut limits = crate::quota::QuotaLimits::default();
        limits.daily.insert(exhausted.to_string(), 10);
        let q = Arc::new(QuotaManager::new(dir.path().join("q.json"), limits));
        // Drive the provider to its block threshold.
        for _ in 0..10 {
            q.use_one(exhausted);
        }
        assert!(!q.can_use(exhausted));
        q
    }

    #[tokio::test]
    async fn exhausted_provider_is_skipped_without_a_call() {
        let dir = tempfile::tempdir().unwrap();
        let quota = quota_with(&dir, "p1");
        let p1 = ScriptedProvider::new("p1", 1, false, false);
        let p2 = ScriptedProvider::new("p2", 2, false, false);
        let p3 = ScriptedProvider::new("p3", 99, true, false);
        let router = ProviderRouter::new(
            vec![p1.clone(), p2.clone(), p3.clone()],
            quota.clone(),
        );

        let out = router
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(out, "answer from p2");
        assert_eq!(p1.calls.load(Ordering::SeqCst), 0);
        assert_eq!(p2.calls.load(Ordering::SeqCst), 1);
        assert_eq!(p3.calls.load(Ordering::SeqCst), 0);
        assert_eq!(quota.status("p2").used, 1);
    }

    #[tokio::test]
    async fn failure_falls_through_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let quota = Arc::new(QuotaManager::new(
            dir.path().join("q.json"),
            crate::quota::QuotaLimits::default(),
        ));
        let p1 = ScriptedProvider::new("p1", 1, false, true);
        let p3 = ScriptedProvider::new("local", 99, true, false);
        let router = ProviderRouter::new(vec![p1.clone(), p3.clone()], quota);

        let out = router
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "answer from local");
        assert_eq!(p1.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_surfaces_last_error() {
        let dir = tempfile::tempdir().unwrap();
        let quota = Arc::new(QuotaManager::new(
            dir.path().join("q.json"),
            crate::quota::QuotaLimits::default(),
        ));
        let p1 = ScriptedProvider::new("p1", 1, false, true);
        let router = ProviderRouter::new(vec![p1], quota);

        let err = router
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.detail, "boom");
    }

    #[tokio::test]
    async fn empty_chain_reports_no_providers() {
        let dir = tempfile::tempdir().unwrap();
        let quota = Arc::new(QuotaManager::new(
            dir.path().join("q.json"),
            crate::quota::QuotaLimits::default(),
        ));
        let router = ProviderRouter::new(vec![], quota);
        let err = router
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.detail, "no providers available");
    }
}
