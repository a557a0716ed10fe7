//! Workflow engine adapter: submit an opaque node-graph spec, poll until
//! terminal, fetch outputs as base64.
//!
//! The engine accepts a DAG of nodes (`node_id -> {class_type, inputs}`),
//! queues it, and exposes results per node. After fetching, the engine's own
//! output files are removed (when its output directory is mounted locally)
//! to bound disk usage.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AdapterError;
use crate::workflows::WorkflowSpec;

/// Default cadence between polls of a queued job.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One output file reference reported by the engine.
#[derive(Clone, Debug)]
pub struct OutputFile {
    pub filename: String,
    pub subfolder: String,
    pub kind: String,
}

/// Terminal and non-terminal job states.
#[derive(Clone, Debug)]
pub enum JobStatus {
    Queued,
    Running,
    Done { outputs: Vec<OutputFile> },
    Error { messages: Vec<String> },
}

/// Engine surface used by the image/video agents. Mocked in tests.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn submit(&self, workflow: &WorkflowSpec) -> Result<String, AdapterError>;

    async fn poll(&self, handle: &str) -> Result<JobStatus, AdapterError>;

    /// Fetches every output of a `Done` job as a `data:image/png;base64,…`
    /// string, cleaning the engine-side files afterwards.
    async fn fetch_outputs(&self, handle: &str) -> Result<Vec<String>, AdapterError>;

    /// Submit, poll until terminal (2 s cadence), fetch. A terminal error
    /// surfaces the engine's messages; exceeding `timeout` is a timeout
    /// error and the session stays on its current stage.
    async fn execute(
        &self,
        workflow: &WorkflowSpec,
        timeout: Duration,
    ) -> Result<Vec<String>, AdapterError> {
        let handle = self.submit(workflow).await?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(AdapterError::timeout(format!(
                    "workflow {handle} exceeded {}s",
                    timeout.as_secs()
                )));
            }
            match self.poll(&handle).await? {
                JobStatus::Queued | JobStatus::Running => continue,
                JobStatus::Done { .. } => return self.fetch_outputs(&handle).await,
                JobStatus::Error { messages } => {
                    return Err(AdapterError::transient(format!(
                        "workflow {handle} failed: {}",
                        messages.join("; ")
                    )))
                }
            }
        }
    }
}

/// HTTP client for the node-graph engine.
pub struct HttpWorkflowEngine {
    base_url: String,
    client: reqwest::Client,
    client_id: String,
    /// Local mount of the engine's output dir; `None` disables cleanup.
    output_dir: Option<PathBuf>,
}

impl HttpWorkflowEngine {
    pub fn new(base_url: impl Into<String>, output_dir: Option<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            client_id: Uuid::new_v4().to_string(),
            output_dir,
        }
    }

    async fn view(&self, file: &OutputFile) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .client
            .get(format!("{}/view", self.base_url))
            .query(&[
                ("filename", file.filename.as_str()),
                ("subfolder", file.subfolder.as_str()),
                ("type", file.kind.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    fn remove_engine_output(&self, file: &OutputFile) {
        let Some(ref dir) = self.output_dir else {
            debug!(filename = %file.filename, "engine output dir not mounted, skipping cleanup");
            return;
        };
        let mut path = dir.clone();
        if !file.subfolder.is_empty() {
            path.push(&file.subfolder);
        }
        path.push(&file.filename);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "engine output cleanup failed");
        }
    }

    fn outputs_from_history(node_outputs: &Value) -> Vec<OutputFile> {
        let mut files = Vec::new();
        let Some(outputs) = node_outputs.as_object() else {
            return files;
        };
        for node_output in outputs.values() {
            for key in ["images", "gifs", "videos"] {
                if let Some(items) = node_output.get(key).and_then(Value::as_array) {
                    for item in items {
                        files.push(OutputFile {
                            filename: item
                                .get("filename")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            subfolder: item
                                .get("subfolder")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            kind: item
                                .get("type")
                                .and_then(Value::as_str)
                                .unwrap_or("output")
                                .to_string(),
                        });
                    }
                }
            }
        }
        files
    }
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn submit(&self, workflow: &WorkflowSpec) -> Result<String, AdapterError> {
        info!(nodes = workflow.nodes.len(), "queueing workflow");
        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&serde_json::json!({
                "prompt": &workflow.nodes,
                "client_id": self.client_id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::fatal(format!("engine rejected workflow: {body}")));
        }

        let data: Value = response.json().await?;
        if let Some(errors) = data.get("node_errors").filter(|v| {
            v.as_object().map(|m| !m.is_empty()).unwrap_or(false)
        }) {
            return Err(AdapterError::fatal(format!("engine node errors: {errors}")));
        }
        data.get("prompt_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::parse("engine response missing prompt_id"))
    }

    async fn poll(&self, handle: &str) -> Result<JobStatus, AdapterError> {
        let history: Value = self
            .client
            .get(format!("{}/history/{handle}", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(entry) = history.get(handle) else {
            return Ok(JobStatus::Running);
        };

        if entry
            .pointer("/status/status_str")
            .and_then(Value::as_str)
            == Some("error")
        {
            let messages = entry
                .pointer("/status/messages")
                .and_then(Value::as_array)
                .map(|msgs| msgs.iter().map(|m| m.to_string()).collect())
                .unwrap_or_default();
            return Ok(JobStatus::Error { messages });
        }

        match entry.get("outputs") {
            Some(outputs) => Ok(JobStatus::Done {
                outputs: Self::outputs_from_history(outputs),
            }),
            None => Ok(JobStatus::Running),
        }
    }

    async fn fetch_outputs(&self, handle: &str) -> Result<Vec<String>, AdapterError> {
        let status = self.poll(handle).await?;
        let JobStatus::Done { outputs } = status else {
            return Err(AdapterError::transient(format!(
                "workflow {handle} has no outputs yet"
            )));
        };

        let mut encoded = Vec::with_capacity(outputs.len());
        for file in &outputs {
            let bytes = self.view(file).await?;
            let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
            encoded.push(format!("data:image/png;base64,{b64}"));
            self.remove_engine_output(file);
        }
        info!(count = encoded.len(), "fetched workflow outputs");
        Ok(encoded)
    }
}
