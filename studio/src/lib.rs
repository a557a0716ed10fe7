//! # Studio
//!
//! Agent orchestration core for a multi-stage content production pipeline:
//! a persistent per-session workflow driver that sequences feedback-driven
//! stage agents (channel naming → benchmarking → character → voice settings
//! → ideas → script → scene prompts → image/video generation → voiceover →
//! composition), routes user messages to the active agent, merges agent
//! output into the session context, and streams progress to clients.
//!
//! ## Main modules
//!
//! - [`orchestrator`]: [`Orchestrator`], [`Stage`] — stage sequencing and
//!   the client surface (`start_workflow`, `process_message`,
//!   `process_message_stream`, `get_session`, `delete_session`).
//! - [`agent`]: the [`Agent`] protocol ([`AgentResult`], [`AgentStatus`])
//!   and the stage agents (planner, benchmarker, character, image prompter,
//!   image generator, quality checker, voiceover, composer).
//! - [`providers`]: [`ChatProvider`], [`ProviderRouter`] — ordered LLM
//!   fallback chain with quota enforcement.
//! - [`quota`]: [`QuotaManager`] — per-provider daily/monthly counters.
//! - [`progress`]: [`ProgressBus`], [`ProgressHandle`] — per-session
//!   ordered progress events (wire shape in the `progress-event` crate).
//! - [`session`]: [`Session`], [`SessionStore`], [`SqliteSessionStore`].
//! - [`benchmark`]: [`BenchmarkCache`], [`BenchmarkReport`] — channel
//!   analysis reports, content-addressed by normalized channel URL.
//! - [`adapters`]: typed async wrappers for the LLM router, vision model,
//!   workflow engine, TTS servers, subprocesses and HTTP downloads.
//! - [`registry`]: [`Registry`] — dependency injection bundle; tests build
//!   one from mocks.
//!
//! The system never generates media itself; it coordinates the services
//! that do.

pub mod adapters;
pub mod agent;
pub mod benchmark;
pub mod context;
pub mod error;
pub mod json_extract;
pub mod message;
pub mod orchestrator;
pub mod paths;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod quota;
pub mod registry;
pub mod screenshot;
pub mod session;
pub mod workflows;
pub mod youtube;

pub use adapters::{AdapterError, AdapterErrorKind, ChatOptions, Llm, Vision, WorkflowEngine};
pub use agent::{Agent, AgentResult, AgentStatus};
pub use benchmark::{BenchmarkCache, BenchmarkReport};
pub use context::SessionContext;
pub use error::StudioError;
pub use message::{AgentMessage, ChatMessage, ChatRole, Role};
pub use orchestrator::{Orchestrator, Response, Stage};
pub use paths::PathPolicy;
pub use progress::{ProgressBus, ProgressHandle};
pub use providers::{ChatProvider, ProviderRouter};
pub use quota::{QuotaLimits, QuotaManager};
pub use registry::Registry;
pub use session::{InMemorySessionStore, Session, SessionStore, SqliteSessionStore};
