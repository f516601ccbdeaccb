//! In-process [`TimeSeriesStore`].
//!
//! Tables are ordered maps keyed by `(series, timestamp)`. Only `memory://`
//! URLs are accepted. Like [`MemoryBroker`](crate::broker::MemoryBroker) it
//! can be switched off to exercise network failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use relay_core::RelayError;
use uuid::Uuid;

use super::{InsertReport, Row, RowFilter, TimeSeriesStore};

const SCHEME: &str = "memory://";

type Table = BTreeMap<(String, DateTime<Utc>), serde_json::Value>;

#[derive(Default)]
struct State {
    tables: AHashMap<String, Table>,
    connections: AHashSet<String>,
}

pub struct MemoryStore {
    state: RwLock<State>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { state: RwLock::new(State::default()), available: AtomicBool::new(true) }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn open_connections(&self) -> usize {
        self.state.read().connections.len()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.read().tables.get(table).map_or(0, BTreeMap::len)
    }

    fn ensure_reachable(&self) -> Result<(), RelayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::Network("store unreachable".into()))
        }
    }

    fn ensure_connection(state: &State, conn_id: &str) -> Result<(), RelayError> {
        if state.connections.contains(conn_id) {
            Ok(())
        } else {
            Err(RelayError::Store(format!("unknown connection '{conn_id}'")))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn connect(&self, url: &str) -> Result<String> {
        if !url.starts_with(SCHEME) {
            return Err(RelayError::Store(format!("unsupported store url '{url}'")).into());
        }
        self.ensure_reachable()?;
        let conn_id = Uuid::new_v4().to_string();
        self.state.write().connections.insert(conn_id.clone());
        Ok(conn_id)
    }

    async fn disconnect(&self, conn_id: &str) -> Result<()> {
        if self.state.write().connections.remove(conn_id) {
            Ok(())
        } else {
            Err(RelayError::Store(format!("unknown connection '{conn_id}'")).into())
        }
    }

    async fn insert(&self, conn_id: &str, table: &str, rows: Vec<Row>) -> Result<Vec<InsertReport>> {
        self.ensure_reachable()?;
        let mut state = self.state.write();
        Self::ensure_connection(&state, conn_id)?;

        let table = state.tables.entry(table.to_string()).or_default();
        let reports = rows
            .into_iter()
            .map(|row| {
                let key = (row.series.clone(), row.timestamp);
                if table.contains_key(&key) {
                    let error = format!("duplicate row {}@{}", row.series, row.timestamp.to_rfc3339());
                    return InsertReport { series: row.series, timestamp: row.timestamp, error: Some(error) };
                }
                table.insert(key, row.data);
                InsertReport { series: row.series, timestamp: row.timestamp, error: None }
            })
            .collect();
        Ok(reports)
    }

    async fn query(&self, conn_id: &str, table: &str, filter: &RowFilter) -> Result<Vec<Row>> {
        self.ensure_reachable()?;
        let state = self.state.read();
        Self::ensure_connection(&state, conn_id)?;

        let Some(table) = state.tables.get(table) else { return Ok(Vec::new()) };
        let mut rows: Vec<Row> = table
            .iter()
            .filter(|((series, ts), _)| {
                (filter.series.is_empty() || filter.series.contains(series)) && filter.since.is_none_or(|since| *ts >= since)
            })
            .map(|((series, ts), data)| Row { series: series.clone(), timestamp: *ts, data: data.clone() })
            .collect();

        rows.sort_by_key(|r| r.timestamp);
        if let Some(limit) = filter.limit {
            let excess = rows.len().saturating_sub(limit);
            rows.drain(..excess);
        }
        Ok(rows)
    }

    async fn latest(&self, conn_id: &str, table: &str, series: &str) -> Result<Option<Row>> {
        self.ensure_reachable()?;
        let state = self.state.read();
        Self::ensure_connection(&state, conn_id)?;

        Ok(state.tables.get(table).and_then(|t| {
            t.iter()
                .rev()
                .find(|((s, _), _)| s == series)
                .map(|((s, ts), data)| Row { series: s.clone(), timestamp: *ts, data: data.clone() })
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_709_251_200 + secs, 0).unwrap()
    }

    fn row(series: &str, secs: i64, v: f64) -> Row {
        Row { series: series.into(), timestamp: at(secs), data: json!({ "v": v }) }
    }

    #[tokio::test]
    async fn connect_checks_scheme() {
        let store = MemoryStore::new();
        assert!(store.connect("postgres://db").await.is_err());
        let id = store.connect("memory://market").await.unwrap();
        assert_eq!(store.open_connections(), 1);
        store.disconnect(&id).await.unwrap();
        assert!(store.disconnect(&id).await.is_err());
    }

    #[tokio::test]
    async fn duplicates_are_refused_per_row() {
        let store = MemoryStore::new();
        let c = store.connect("memory://m").await.unwrap();
        store.insert(&c, "t", vec![row("btc", 0, 1.0)]).await.unwrap();
        let reports = store.insert(&c, "t", vec![row("btc", 0, 2.0), row("btc", 60, 3.0)]).await.unwrap();
        assert!(!reports[0].is_inserted());
        assert!(reports[1].is_inserted());
        assert_eq!(store.row_count("t"), 2);
    }

    #[tokio::test]
    async fn query_filters_and_limits() {
        let store = MemoryStore::new();
        let c = store.connect("memory://m").await.unwrap();
        store
            .insert(&c, "t", vec![row("btc", 0, 1.0), row("eth", 30, 2.0), row("btc", 60, 3.0), row("btc", 120, 4.0)])
            .await
            .unwrap();

        let all = store.query(&c, "t", &RowFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![at(0), at(30), at(60), at(120)]);

        let filter = RowFilter { series: vec!["btc".into()], since: Some(at(0) + Duration::seconds(1)), limit: Some(1) };
        let rows = store.query(&c, "t", &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data["v"], 4.0);

        let latest = store.latest(&c, "t", "eth").await.unwrap().unwrap();
        assert_eq!(latest.timestamp, at(30));
    }

    #[tokio::test]
    async fn unreachable_store_is_network_error() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = store.connect("memory://m").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<RelayError>(), Some(RelayError::Network(_))));
    }
}
