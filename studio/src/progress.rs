//! Per-session progress bus.
//!
//! Each session owns an ordered, append-only event log. Components emit
//! through a [`ProgressHandle`] bound to one session; the handle is a
//! required constructor argument wherever progress is reported, never a
//! process global. Consumers read incrementally by index or subscribe to a
//! run. Events are in-memory only and discarded on restart.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use progress_event::ProgressEvent;
use tokio::sync::Notify;

/// One recorded event: status, detail, emission time.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressRecord {
    pub status: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn to_event(&self) -> ProgressEvent {
        ProgressEvent::Progress {
            status: self.status.clone(),
            detail: self.detail.clone(),
            timestamp: self.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Default)]
struct SessionLog {
    records: Mutex<Vec<ProgressRecord>>,
    notify: Notify,
}

/// In-memory bus: session id → ordered event log.
#[derive(Clone, Default)]
pub struct ProgressBus {
    sessions: Arc<DashMap<String, Arc<SessionLog>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn log_for(&self, session_id: &str) -> Arc<SessionLog> {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// A cloneable emitter bound to one session.
    pub fn handle(&self, session_id: &str) -> ProgressHandle {
        ProgressHandle {
            log: self.log_for(session_id),
        }
    }

    /// Events at positions `>= from`, in emission order.
    pub fn read_from(&self, session_id: &str, from: usize) -> Vec<ProgressRecord> {
        match self.sessions.get(session_id) {
            Some(log) => {
                let records = log.records.lock().unwrap_or_else(|e| e.into_inner());
                records.iter().skip(from).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Current length of the session's log.
    pub fn len(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map(|log| log.records.lock().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    /// Truncates the session's log; the next run starts from index zero.
    pub fn reset(&self, session_id: &str) {
        if let Some(log) = self.sessions.get(session_id) {
            log.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
            log.notify.notify_waiters();
        }
    }

    /// Drops the session's log entirely (session delete).
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Waits until the log grows past `seen` and returns the new events.
    pub async fn wait_past(&self, session_id: &str, seen: usize) -> Vec<ProgressRecord> {
        let log = self.log_for(session_id);
        loop {
            let notified = log.notify.notified();
            {
                let records = log.records.lock().unwrap_or_else(|e| e.into_inner());
                if records.len() > seen {
                    return records.iter().skip(seen).cloned().collect();
                }
            }
            notified.await;
        }
    }
}

/// Emitter bound to one session's log.
#[derive(Clone)]
pub struct ProgressHandle {
    log: Arc<SessionLog>,
}

impl ProgressHandle {
    /// A handle that records to a detached log; for tests and one-off tools.
    pub fn detached() -> Self {
        Self {
            log: Arc::new(SessionLog::default()),
        }
    }

    pub fn emit(&self, status: impl Into<String>, detail: impl Into<String>) {
        let record = ProgressRecord {
            status: status.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        };
        tracing::debug!(status = %record.status, detail = %record.detail, "progress");
        self.log
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        self.log.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_preserve_emission_order() {
        let bus = ProgressBus::new();
        let handle = bus.handle("s1");
        handle.emit("a", "1");
        handle.emit("b", "2");
        handle.emit("c", "3");

        let records = bus.read_from("s1", 0);
        let statuses: Vec<&str> = records.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn incremental_reads_do_not_duplicate() {
        let bus = ProgressBus::new();
        let handle = bus.handle("s1");
        handle.emit("a", "");
        let first = bus.read_from("s1", 0);
        handle.emit("b", "");
        let second = bus.read_from("s1", first.len());
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].status, "b");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let bus = ProgressBus::new();
        bus.handle("s1").emit("one", "");
        bus.handle("s2").emit("two", "");
        assert_eq!(bus.read_from("s1", 0).len(), 1);
        assert_eq!(bus.read_from("s2", 0).len(), 1);
        assert_eq!(bus.read_from("s1", 0)[0].status, "one");
    }

    #[tokio::test]
    async fn wait_past_wakes_on_new_event() {
        let bus = ProgressBus::new();
        let handle = bus.handle("s1");
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_past("s1", 0).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.emit("late", "");
        let events = waiter.await.unwrap();
        assert_eq!(events[0].status, "late");
    }

    #[tokio::test]
    async fn remove_discards_the_log() {
        let bus = ProgressBus::new();
        bus.handle("s1").emit("a", "");
        assert!(bus.remove("s1"));
        assert!(bus.read_from("s1", 0).is_empty());
    }
}
