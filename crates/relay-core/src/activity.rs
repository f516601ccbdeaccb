//! Per-actor activity counters and the status snapshot built from them.
//!
//! Counters are atomics so an actor shared across tasks can be driven
//! concurrently. Only [`Workflow`](crate::workflow::Workflow) mutates them.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::registry::ClientSummary;
use crate::types::ActorRole;

/// Process-local operation/error counters for one actor.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    total_operations: AtomicU64,
    error_count: AtomicU64,
    last_activity: Mutex<Option<DateTime<Utc>>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// An operation reached the success path.
    pub(crate) fn record_success(&self) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let mut last = self.last_activity.lock();
        // never move backwards, even if the wall clock does
        if last.is_none_or(|prev| now > prev) {
            *last = Some(now);
        }
    }

    /// A plugin, transform or batch-validation failure was caught.
    pub(crate) fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.total_operations.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        *self.last_activity.lock() = None;
    }

    pub fn total_operations(&self) -> u64 {
        self.total_operations.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        *self.last_activity.lock()
    }
}

/// Read-only snapshot of an actor, recomputed on every call.
///
/// `metadata` holds backend-specific extensions (broker list, topic names,
/// pool size...) that callers should treat as opaque.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorStatus {
    pub name: String,
    pub role: ActorRole,
    pub is_initialized: bool,
    pub is_connected: bool,
    pub total_operations: u64,
    pub error_count: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub registered_clients: Vec<ClientSummary>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ActorStatus {
    /// Attach a backend-specific metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.metadata.insert(key.to_string(), value);
        self
    }
}

impl std::fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) init={} connected={} ops={} errors={} clients={}",
            self.name,
            self.role,
            self.is_initialized,
            self.is_connected,
            self.total_operations,
            self.error_count,
            self.registered_clients.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_moves_last_activity_forward() {
        let t = ActivityTracker::new();
        assert!(t.last_activity().is_none());
        t.record_success();
        let first = t.last_activity().unwrap();
        t.record_success();
        assert!(t.last_activity().unwrap() >= first);
        assert_eq!(t.total_operations(), 2);
        assert_eq!(t.error_count(), 0);
    }

    #[test]
    fn errors_do_not_touch_activity() {
        let t = ActivityTracker::new();
        t.record_error();
        assert_eq!(t.error_count(), 1);
        assert_eq!(t.total_operations(), 0);
        assert!(t.last_activity().is_none());
    }

    #[test]
    fn reset_clears() {
        let t = ActivityTracker::new();
        t.record_success();
        t.record_error();
        t.reset();
        assert_eq!(t.total_operations(), 0);
        assert_eq!(t.error_count(), 0);
        assert!(t.last_activity().is_none());
    }
}
