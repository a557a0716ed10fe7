//! Durable per-session state: current stage, context map, message history.
//!
//! The SQLite store keeps one row per session with JSON columns for the
//! context and history; each call opens its own connection inside
//! `spawn_blocking`. An in-memory store backs tests.

use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::context::SessionContext;
use crate::message::AgentMessage;
use crate::orchestrator::Stage;

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store: {0}")]
    Other(String),
}

impl From<rusqlite::Error> for SessionStoreError {
    fn from(e: rusqlite::Error) -> Self {
        SessionStoreError::Other(e.to_string())
    }
}

/// The root entity: one end-to-end content production.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub current_stage: Stage,
    pub context: SessionContext,
    pub history: Vec<AgentMessage>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            current_stage: Stage::ChannelName,
            context: SessionContext::new(),
            history: Vec::new(),
        }
    }

    pub fn push_history(&mut self, message: AgentMessage) {
        self.history.push(message);
    }
}

/// Durable mapping from session id to [`Session`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError>;

    /// Full replace.
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    async fn delete(&self, session_id: &str) -> Result<bool, SessionStoreError>;

    async fn get_or_create(&self, session_id: &str) -> Result<Session, SessionStoreError> {
        match self.load(session_id).await? {
            Some(session) => Ok(session),
            None => Ok(Session::new(session_id)),
        }
    }
}

/// SQLite-backed store: one table `sessions (id, current_stage, context, history)`.
pub struct SqliteSessionStore {
    db_path: std::path::PathBuf,
}

impl SqliteSessionStore {
    /// Creates the store and ensures the table exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SessionStoreError> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionStoreError::Other(e.to_string()))?;
        }
        let conn = rusqlite::Connection::open(&db_path)?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                current_stage TEXT NOT NULL,
                context TEXT NOT NULL,
                history TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { db_path })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT current_stage, context, history FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![session_id])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            let stage_str: String = row.get(0)?;
            let context_json: String = row.get(1)?;
            let history_json: String = row.get(2)?;

            let current_stage = Stage::parse(&stage_str)
                .ok_or_else(|| SessionStoreError::Other(format!("bad stage: {stage_str}")))?;
            let context = serde_json::from_str(&context_json)
                .map_err(|e| SessionStoreError::Other(e.to_string()))?;
            let history = serde_json::from_str(&history_json)
                .map_err(|e| SessionStoreError::Other(e.to_string()))?;
            Ok(Some(Session {
                id: session_id,
                current_stage,
                context,
                history,
            }))
        })
        .await
        .map_err(|e| SessionStoreError::Other(e.to_string()))?
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let db_path = self.db_path.clone();
        let id = session.id.clone();
        let stage = session.current_stage.as_str().to_string();
        let context = serde_json::to_string(&session.context)
            .map_err(|e| SessionStoreError::Other(e.to_string()))?;
        let history = serde_json::to_string(&session.history)
            .map_err(|e| SessionStoreError::Other(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)?;
            conn.execute(
                r#"
                INSERT INTO sessions (id, current_stage, context, history)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    current_stage = excluded.current_stage,
                    context = excluded.context,
                    history = excluded.history
                "#,
                params![id, stage, context, history],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| SessionStoreError::Other(e.to_string()))?
    }

    async fn delete(&self, session_id: &str) -> Result<bool, SessionStoreError> {
        let db_path = self.db_path.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)?;
            let n = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(n > 0)
        })
        .await
        .map_err(|e| SessionStoreError::Other(e.to_string()))?
    }
}

/// Map-backed store for tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, SessionStoreError> {
        Ok(self.sessions.remove(session_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_session() -> Session {
        let mut session = Session::new("s-1");
        session.current_stage = Stage::VideoIdeas;
        session.context.set("selected_channel_name", json!("투자연구소"));
        session.context.set(
            "video_ideas",
            json!([{"title": "아이디어", "hook": "훅"}]),
        );
        session.push_history(AgentMessage::user("안녕하세요"));
        session.push_history(AgentMessage::assistant("반갑습니다"));
        session
    }

    #[tokio::test]
    async fn sqlite_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::new(dir.path().join("sessions.db")).unwrap();
        let session = sample_session();
        store.save(&session).await.unwrap();
        let loaded = store.load("s-1").await.unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn sqlite_save_is_full_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::new(dir.path().join("sessions.db")).unwrap();
        let mut session = sample_session();
        store.save(&session).await.unwrap();

        session.context.remove("video_ideas");
        session.current_stage = Stage::Script;
        store.save(&session).await.unwrap();

        let loaded = store.load("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_stage, Stage::Script);
        assert!(!loaded.context.contains("video_ideas"));
    }

    #[tokio::test]
    async fn delete_then_load_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::new(dir.path().join("sessions.db")).unwrap();
        store.save(&sample_session()).await.unwrap();
        assert!(store.delete("s-1").await.unwrap());
        assert!(store.load("s-1").await.unwrap().is_none());
        assert!(!store.delete("s-1").await.unwrap());
    }

    #[tokio::test]
    async fn get_or_create_starts_at_channel_name() {
        let store = InMemorySessionStore::new();
        let session = store.get_or_create("fresh").await.unwrap();
        assert_eq!(session.current_stage, Stage::ChannelName);
        assert!(session.context.0.is_empty());
    }
}
