//! Message-broker actors.
//!
//! The broker itself is an external collaborator reached through the
//! [`Broker`] trait; a production deployment plugs a native client in behind
//! it. [`MemoryBroker`] is the in-process implementation used by the runner's
//! local mode and by tests.
//!
//! # Topics and keys
//!
//! Each canonical value type has its own topic ([`TopicNames`]). Records are
//! keyed by coin id (prices, candles), ticker (top of book) or `"global"`
//! (analytics) so that keyed lookups behave like a compacted topic.
//!
//! [`TopicNames`]: relay_core::config::TopicNames

pub mod memory;
pub mod reader;
pub mod writer;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::config::BrokerConfig;
use relay_core::error::{DomainError, categorize, codes};
use relay_core::registry::ClientConfig;
use relay_core::workflow::Workflow;
use relay_core::{ClientType, Outcome, RelayError};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

pub use self::memory::MemoryBroker;
pub use self::reader::BrokerReader;
pub use self::writer::BrokerWriter;

/// Key used for the single analytics series.
pub const ANALYTICS_KEY: &str = "global";

/// One record as stored on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRecord {
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    /// Position in the topic, assigned by the broker.
    pub offset: u64,
}

/// A record to publish.
#[derive(Debug, Clone)]
pub struct OutgoingRecord {
    pub key: String,
    pub payload: Vec<u8>,
}

/// Per-record delivery result. `error` is set when the broker refused the
/// record (too large, unknown topic...).
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub key: String,
    pub offset: Option<u64>,
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none() && self.offset.is_some()
    }
}

/// Contract a broker client must satisfy. Transport failures are raised as
/// [`RelayError::Network`](relay_core::RelayError::Network).
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self, client_id: &str) -> Result<()>;

    async fn disconnect(&self, client_id: &str) -> Result<()>;

    /// Publish a batch; one report per record, in order.
    async fn publish(&self, client_id: &str, topic: &str, records: Vec<OutgoingRecord>) -> Result<Vec<DeliveryReport>>;

    /// Consume up to `max` records past the group's committed offset and
    /// commit the new position.
    async fn poll(&self, client_id: &str, topic: &str, group: &str, max: usize) -> Result<Vec<BrokerRecord>>;

    /// Most recent record with the given key, without moving any offset.
    async fn latest(&self, client_id: &str, topic: &str, key: &str) -> Result<Option<BrokerRecord>>;
}

/// Handle registered in the broker actors' client registry.
pub struct BrokerConnection {
    pub broker: Arc<dyn Broker>,
    pub client_id: String,
    pub bootstrap: Vec<String>,
}

/// Connect a broker client for `config` and register it as the actor's only
/// association.
pub(crate) async fn open(
    workflow: &Workflow<BrokerConnection>,
    broker: &Arc<dyn Broker>,
    config: &BrokerConfig,
) -> Outcome<()> {
    if workflow.is_initialized() {
        debug!("[{}] already initialized, connection kept", workflow.name());
        return Outcome::Success(());
    }
    // keys are unique per config, so readers and writers sharing a broker never collide
    let client_id = format!("{}:{}", config.client_id, config.key);
    if let Err(e) = broker.connect(&client_id).await {
        warn!("[{}] connect failed: {e:#}", workflow.name());
        return Outcome::Failure(
            DomainError::new(codes::INITIALIZATION_FAILED, format!("broker connect failed: {e:#}"), categorize(&e))
                .with_context("actor", workflow.name())
                .with_context("brokers", &config.brokers),
        );
    }

    let bootstrap = config.brokers.join(",");
    let conn = BrokerConnection { broker: Arc::clone(broker), client_id, bootstrap: config.brokers.clone() };
    workflow.add_connected_client(
        config.key.clone(),
        Arc::new(conn),
        ClientConfig::new(format!("broker {bootstrap}"), ClientType::MessageBroker),
    );
    workflow.mark_initialized();
    info!("[{}] connected to {bootstrap}", workflow.name());
    Outcome::Success(())
}

/// Tear the workflow down and disconnect every released client.
pub(crate) async fn close(workflow: &Workflow<BrokerConnection>) -> Outcome<()> {
    let released = workflow.teardown();
    let mut failures = Vec::new();
    for assoc in &released {
        if let Err(e) = assoc.client.broker.disconnect(&assoc.client.client_id).await {
            warn!("[{}] disconnect of '{}' failed: {e:#}", workflow.name(), assoc.key);
            failures.push(format!("{}: {e:#}", assoc.key));
        }
    }

    if failures.is_empty() {
        info!("[{}] cleaned up ({} client(s) released)", workflow.name(), released.len());
        Outcome::Success(())
    } else {
        Outcome::Failure(
            DomainError::system(codes::CLEANUP_FAILED, format!("{} client(s) failed to disconnect", failures.len()))
                .with_context("actor", workflow.name())
                .with_context("failures", failures),
        )
    }
}

/// Decode a record's JSON payload.
pub(crate) fn decode<T: DeserializeOwned>(record: &BrokerRecord) -> Result<T> {
    serde_json::from_slice(&record.payload)
        .map_err(|e| RelayError::Parse(format!("record at offset {}: {e}", record.offset)).into())
}
