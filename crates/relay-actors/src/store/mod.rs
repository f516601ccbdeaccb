//! Time-series store actors.
//!
//! The database is reached through the [`TimeSeriesStore`] trait; a real
//! driver plugs in behind it. [`MemoryStore`] is the in-process
//! implementation.
//!
//! # Tables
//!
//! One table per canonical value type, named `<table_prefix><name>`:
//!
//! | Table         | Series     | Timestamp        |
//! |---------------|------------|------------------|
//! | `prices`      | coin id    | `lastUpdated`    |
//! | `candles`     | coin id    | candle open time |
//! | `analytics`   | `"global"` | snapshot time    |
//! | `top_of_book` | ticker     | quote time       |
//!
//! Rows hold the camelCase JSON of the value. A `(series, timestamp)` pair is
//! unique per table.
//!
//! # Connection pool
//!
//! Store actors open `pool_size` connections and register each one as
//! `"<key>#<i>"`; operations run on the first connected one.

pub mod memory;
pub mod reader;
pub mod writer;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::config::StoreConfig;
use relay_core::error::{DomainError, categorize, codes};
use relay_core::registry::ClientConfig;
use relay_core::workflow::Workflow;
use relay_core::{ClientType, Outcome, RelayError};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

pub use self::memory::MemoryStore;
pub use self::reader::StoreReader;
pub use self::writer::StoreWriter;

pub const PRICES_TABLE: &str = "prices";
pub const CANDLES_TABLE: &str = "candles";
pub const ANALYTICS_TABLE: &str = "analytics";
pub const TOP_OF_BOOK_TABLE: &str = "top_of_book";

/// Series name of the analytics table.
pub const ANALYTICS_SERIES: &str = "global";

/// One stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub series: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// Per-row insert result; `error` is set for refused rows.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertReport {
    pub series: String,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl InsertReport {
    pub fn is_inserted(&self) -> bool {
        self.error.is_none()
    }
}

/// Row selection for [`TimeSeriesStore::query`].
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    /// Series to include; empty means all.
    pub series: Vec<String>,
    /// Inclusive lower bound on the row timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Keep at most this many of the most recent rows.
    pub limit: Option<usize>,
}

/// Contract a time-series database driver must satisfy. Unreachable
/// databases are reported as [`RelayError::Network`].
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Open a connection and return its id.
    async fn connect(&self, url: &str) -> Result<String>;

    async fn disconnect(&self, conn_id: &str) -> Result<()>;

    /// Insert rows; one report per row, in order.
    async fn insert(&self, conn_id: &str, table: &str, rows: Vec<Row>) -> Result<Vec<InsertReport>>;

    /// Matching rows, oldest first.
    async fn query(&self, conn_id: &str, table: &str, filter: &RowFilter) -> Result<Vec<Row>>;

    /// Most recent row of a series.
    async fn latest(&self, conn_id: &str, table: &str, series: &str) -> Result<Option<Row>>;
}

/// One pooled connection, as registered in the store actors' registry.
pub struct StoreConnection {
    pub store: Arc<dyn TimeSeriesStore>,
    pub conn_id: String,
    pub url: String,
}

/// Open `pool_size` connections and register them. An initialized actor
/// keeps its pool.
pub(crate) async fn open(workflow: &Workflow<StoreConnection>, store: &Arc<dyn TimeSeriesStore>, config: &StoreConfig) -> Outcome<()> {
    if workflow.is_initialized() {
        debug!("[{}] already initialized, pool kept", workflow.name());
        return Outcome::Success(());
    }
    if config.pool_size == 0 {
        return Outcome::Failure(
            DomainError::business(codes::INITIALIZATION_FAILED, "pool_size must be > 0").with_context("actor", workflow.name()),
        );
    }

    let mut opened = Vec::with_capacity(config.pool_size);
    for _ in 0..config.pool_size {
        match store.connect(&config.url).await {
            Ok(conn_id) => opened.push(conn_id),
            Err(e) => {
                warn!("[{}] connect to {} failed: {e:#}", workflow.name(), config.url);
                for conn_id in &opened {
                    if let Err(e) = store.disconnect(conn_id).await {
                        warn!("[{}] rollback of connection {conn_id} failed: {e:#}", workflow.name());
                    }
                }
                return Outcome::Failure(
                    DomainError::new(codes::INITIALIZATION_FAILED, format!("store connect failed: {e:#}"), categorize(&e))
                        .with_context("actor", workflow.name())
                        .with_context("url", &config.url),
                );
            }
        }
    }

    for (i, conn_id) in opened.into_iter().enumerate() {
        let conn = StoreConnection { store: Arc::clone(store), conn_id, url: config.url.clone() };
        workflow.add_connected_client(
            format!("{}#{i}", config.key),
            Arc::new(conn),
            ClientConfig::new(format!("store {}", config.url), ClientType::Database),
        );
    }
    workflow.mark_initialized();
    info!("[{}] opened {} connection(s) to {}", workflow.name(), config.pool_size, config.url);
    Outcome::Success(())
}

/// Tear the workflow down and close every pooled connection.
pub(crate) async fn close(workflow: &Workflow<StoreConnection>) -> Outcome<()> {
    let released = workflow.teardown();
    let mut failures = Vec::new();
    for assoc in &released {
        if let Err(e) = assoc.client.store.disconnect(&assoc.client.conn_id).await {
            warn!("[{}] closing '{}' failed: {e:#}", workflow.name(), assoc.key);
            failures.push(format!("{}: {e:#}", assoc.key));
        }
    }

    if failures.is_empty() {
        info!("[{}] cleaned up ({} connection(s) closed)", workflow.name(), released.len());
        Outcome::Success(())
    } else {
        Outcome::Failure(
            DomainError::system(codes::CLEANUP_FAILED, format!("{} connection(s) failed to close", failures.len()))
                .with_context("actor", workflow.name())
                .with_context("failures", failures),
        )
    }
}

/// Decode a row's JSON document.
pub(crate) fn decode<T: DeserializeOwned>(row: &Row) -> Result<T> {
    T::deserialize(&row.data)
        .map_err(|e| RelayError::Parse(format!("row {}@{}: {e}", row.series, row.timestamp.to_rfc3339())).into())
}
