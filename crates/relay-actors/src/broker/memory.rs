//! In-process [`Broker`] implementation.
//!
//! Topics are append-only vectors; a record's offset is its index. Consumer
//! groups commit on every poll. The broker can be switched "down" to
//! exercise network-failure paths.

use std::sync::atomic::{AtomicBool, Ordering};

use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use relay_core::RelayError;

use super::{Broker, BrokerRecord, DeliveryReport, OutgoingRecord};

/// Default per-record size limit (1 MiB).
const DEFAULT_MAX_MESSAGE_BYTES: usize = 1 << 20;

#[derive(Default)]
struct State {
    topics: AHashMap<String, Vec<BrokerRecord>>,
    /// `(group, topic)` → next offset to deliver.
    committed: AHashMap<(String, String), usize>,
    clients: AHashSet<String>,
}

pub struct MemoryBroker {
    state: Mutex<State>,
    max_message_bytes: usize,
    available: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_max_message_bytes(DEFAULT_MAX_MESSAGE_BYTES)
    }

    pub fn with_max_message_bytes(max_message_bytes: usize) -> Self {
        Self { state: Mutex::new(State::default()), max_message_bytes, available: AtomicBool::new(true) }
    }

    /// Simulate an outage: every call fails with a network error while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_client_connected(&self, client_id: &str) -> bool {
        self.state.lock().clients.contains(client_id)
    }

    pub fn topic_len(&self, topic: &str) -> usize {
        self.state.lock().topics.get(topic).map_or(0, Vec::len)
    }

    fn ensure_reachable(&self) -> Result<(), RelayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::Network("broker unavailable".into()))
        }
    }

    fn ensure_client(state: &State, client_id: &str) -> Result<(), RelayError> {
        if state.clients.contains(client_id) {
            Ok(())
        } else {
            Err(RelayError::Broker(format!("client '{client_id}' is not connected")))
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect(&self, client_id: &str) -> Result<()> {
        self.ensure_reachable()?;
        self.state.lock().clients.insert(client_id.to_string());
        Ok(())
    }

    async fn disconnect(&self, client_id: &str) -> Result<()> {
        self.state.lock().clients.remove(client_id);
        Ok(())
    }

    async fn publish(&self, client_id: &str, topic: &str, records: Vec<OutgoingRecord>) -> Result<Vec<DeliveryReport>> {
        self.ensure_reachable()?;
        let mut state = self.state.lock();
        Self::ensure_client(&state, client_id)?;

        let log = state.topics.entry(topic.to_string()).or_default();
        let reports = records
            .into_iter()
            .map(|rec| {
                if rec.payload.len() > self.max_message_bytes {
                    return DeliveryReport {
                        key: rec.key,
                        offset: None,
                        error: Some(format!("record of {} bytes exceeds {} byte limit", rec.payload.len(), self.max_message_bytes)),
                    };
                }
                let offset = log.len() as u64;
                log.push(BrokerRecord { key: Some(rec.key.clone()), payload: rec.payload, timestamp: Utc::now(), offset });
                DeliveryReport { key: rec.key, offset: Some(offset), error: None }
            })
            .collect();
        Ok(reports)
    }

    async fn poll(&self, client_id: &str, topic: &str, group: &str, max: usize) -> Result<Vec<BrokerRecord>> {
        self.ensure_reachable()?;
        let mut state = self.state.lock();
        Self::ensure_client(&state, client_id)?;

        let State { topics, committed, .. } = &mut *state;
        let Some(log) = topics.get(topic) else { return Ok(Vec::new()) };
        let position = committed.entry((group.to_string(), topic.to_string())).or_insert(0);
        let end = (*position + max).min(log.len());
        let batch = log[*position..end].to_vec();
        *position = end;
        Ok(batch)
    }

    async fn latest(&self, client_id: &str, topic: &str, key: &str) -> Result<Option<BrokerRecord>> {
        self.ensure_reachable()?;
        let state = self.state.lock();
        Self::ensure_client(&state, client_id)?;

        Ok(state
            .topics
            .get(topic)
            .and_then(|log| log.iter().rev().find(|r| r.key.as_deref() == Some(key)))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(key: &str, payload: &str) -> OutgoingRecord {
        OutgoingRecord { key: key.into(), payload: payload.as_bytes().to_vec() }
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let b = MemoryBroker::new();
        assert!(b.publish("c1", "t", vec![rec("k", "v")]).await.is_err());
        b.connect("c1").await.unwrap();
        let reports = b.publish("c1", "t", vec![rec("k", "v"), rec("k2", "v2")]).await.unwrap();
        assert_eq!(reports.iter().map(|r| r.offset).collect::<Vec<_>>(), vec![Some(0), Some(1)]);
        assert_eq!(b.topic_len("t"), 2);
    }

    #[tokio::test]
    async fn oversized_records_are_refused_individually() {
        let b = MemoryBroker::with_max_message_bytes(4);
        b.connect("c").await.unwrap();
        let reports = b.publish("c", "t", vec![rec("a", "1234"), rec("b", "12345")]).await.unwrap();
        assert!(reports[0].is_delivered());
        assert!(!reports[1].is_delivered());
        assert_eq!(b.topic_len("t"), 1);
    }

    #[tokio::test]
    async fn poll_commits_per_group() {
        let b = MemoryBroker::new();
        b.connect("c").await.unwrap();
        b.publish("c", "t", (0..5).map(|i| rec("k", &i.to_string())).collect()).await.unwrap();

        assert_eq!(b.poll("c", "t", "g1", 3).await.unwrap().len(), 3);
        assert_eq!(b.poll("c", "t", "g1", 3).await.unwrap().len(), 2);
        assert!(b.poll("c", "t", "g1", 3).await.unwrap().is_empty());
        assert_eq!(b.poll("c", "t", "g2", 10).await.unwrap().len(), 5);
        assert!(b.poll("c", "missing", "g1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_by_key() {
        let b = MemoryBroker::new();
        b.connect("c").await.unwrap();
        b.publish("c", "t", vec![rec("btc", "1"), rec("eth", "2"), rec("btc", "3")]).await.unwrap();
        let r = b.latest("c", "t", "btc").await.unwrap().unwrap();
        assert_eq!(r.payload, b"3");
        assert!(b.latest("c", "t", "sol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn outage_is_a_network_error() {
        let b = MemoryBroker::new();
        b.connect("c").await.unwrap();
        b.set_available(false);
        let err = b.poll("c", "t", "g", 1).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<RelayError>(), Some(RelayError::Network(_))));
    }
}
