//! Time-series store writer.
//!
//! Each canonical value becomes one row in its table; a value whose
//! `(series, timestamp)` is already stored is refused by the store and
//! dropped from the receipt.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::config::StoreConfig;
use relay_core::workflow::{BatchOperation, Operation, Workflow};
use relay_core::*;
use serde::Serialize;

use super::{
    ANALYTICS_SERIES, ANALYTICS_TABLE, CANDLES_TABLE, InsertReport, PRICES_TABLE, Row, StoreConnection, TOP_OF_BOOK_TABLE,
    TimeSeriesStore, close, open,
};

/// Where a value lands: its series and row timestamp.
type RowKey<T> = fn(&T) -> (String, DateTime<Utc>);

#[derive(Debug, Clone, Serialize)]
pub struct InsertArgs<T> {
    pub table: String,
    pub value: T,
}

/// Insert one value. A row the store refuses fails validation.
pub struct InsertOne<T> {
    name: &'static str,
    row_key: RowKey<T>,
    accept: fn(&T) -> bool,
}

impl<T> InsertOne<T> {
    pub fn new(name: &'static str, row_key: RowKey<T>, accept: fn(&T) -> bool) -> Self {
        Self { name, row_key, accept }
    }
}

#[async_trait]
impl<T> Operation<StoreConnection> for InsertOne<T>
where
    T: Serialize + Send + Sync + 'static,
{
    type Args = InsertArgs<T>;
    type Raw = InsertReport;
    type Output = InsertReport;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &InsertArgs<T>) -> Result<(), String> {
        if (self.accept)(&args.value) { Ok(()) } else { Err("refusing to store an invalid record".into()) }
    }

    async fn plugin(&self, conn: &StoreConnection, args: &InsertArgs<T>) -> Result<InsertReport> {
        let row = to_row(self.row_key, &args.value)?;
        let reports = conn.store.insert(&conn.conn_id, &args.table, vec![row]).await?;
        reports.into_iter().next().ok_or_else(|| anyhow!("store returned no insert report"))
    }

    fn validate(&self, raw: &InsertReport) -> bool {
        raw.is_inserted()
    }

    fn transform(&self, raw: InsertReport, _args: &InsertArgs<T>) -> Result<InsertReport> {
        Ok(raw)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InsertBatchArgs<T> {
    pub table: String,
    pub values: Vec<T>,
}

/// Insert many values. Values failing `accept` are never sent and come back
/// as refused reports.
pub struct InsertBatch<T> {
    name: &'static str,
    row_key: RowKey<T>,
    accept: fn(&T) -> bool,
}

impl<T> InsertBatch<T> {
    pub fn new(name: &'static str, row_key: RowKey<T>, accept: fn(&T) -> bool) -> Self {
        Self { name, row_key, accept }
    }
}

#[async_trait]
impl<T> BatchOperation<StoreConnection> for InsertBatch<T>
where
    T: Serialize + Send + Sync + 'static,
{
    type Args = InsertBatchArgs<T>;
    type Item = InsertReport;
    type Output = InsertReport;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &InsertBatchArgs<T>) -> Result<(), String> {
        if args.values.is_empty() { Err("nothing to store".into()) } else { Ok(()) }
    }

    async fn plugin(&self, conn: &StoreConnection, args: &InsertBatchArgs<T>) -> Result<Vec<InsertReport>> {
        let mut refused = Vec::new();
        let mut rows = Vec::with_capacity(args.values.len());
        for value in &args.values {
            if (self.accept)(value) {
                rows.push(to_row(self.row_key, value)?);
            } else {
                let (series, timestamp) = (self.row_key)(value);
                refused.push(InsertReport { series, timestamp, error: Some("invalid record".into()) });
            }
        }

        let mut reports = if rows.is_empty() { Vec::new() } else { conn.store.insert(&conn.conn_id, &args.table, rows).await? };
        reports.extend(refused);
        Ok(reports)
    }

    fn validate_item(&self, item: &InsertReport) -> bool {
        item.is_inserted()
    }

    fn transform_item(&self, item: InsertReport, _args: &InsertBatchArgs<T>) -> Result<InsertReport> {
        Ok(item)
    }
}

fn to_row<T: Serialize>(row_key: RowKey<T>, value: &T) -> Result<Row> {
    let (series, timestamp) = row_key(value);
    let data = serde_json::to_value(value).with_context(|| format!("failed to encode row {series}"))?;
    Ok(Row { series, timestamp, data })
}

fn price_key(p: &PricePoint) -> (String, DateTime<Utc>) {
    (p.coin_id.clone(), p.last_updated)
}

fn candle_key(c: &OhlcvCandle) -> (String, DateTime<Utc>) {
    (c.coin_id.clone(), c.timestamp)
}

fn analytics_key(s: &MarketAnalyticsSnapshot) -> (String, DateTime<Utc>) {
    (ANALYTICS_SERIES.to_string(), s.timestamp)
}

fn top_of_book_key(q: &TopOfBook) -> (String, DateTime<Utc>) {
    (q.ticker.clone(), q.timestamp)
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub struct StoreWriter {
    config: StoreConfig,
    store: Arc<dyn TimeSeriesStore>,
    workflow: Workflow<StoreConnection>,
}

impl StoreWriter {
    pub fn new(config: StoreConfig, store: Arc<dyn TimeSeriesStore>) -> Self {
        let workflow = Workflow::new(format!("store-writer:{}", config.key), ActorRole::Writer);
        Self { config, store, workflow }
    }

    fn receipt(&self, table: String, records: usize) -> WriteReceipt {
        WriteReceipt { destination: table, records: records as u64, source: self.workflow.name().to_string(), timestamp: Utc::now() }
    }

    async fn insert_one<T>(&self, op: InsertOne<T>, table: &str, value: &T) -> Outcome<WriteReceipt>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let table = self.config.table(table);
        let args = InsertArgs { table: table.clone(), value: value.clone() };
        self.workflow.execute(&op, args, None).await.map(|_| self.receipt(table, 1))
    }

    async fn insert_many<T>(&self, op: InsertBatch<T>, table: &str, values: &[T]) -> Outcome<WriteReceipt>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let table = self.config.table(table);
        let args = InsertBatchArgs { table: table.clone(), values: values.to_vec() };
        self.workflow.execute_batch(&op, args, None).await.map(|stored| self.receipt(table, stored.len()))
    }
}

#[async_trait]
impl Actor for StoreWriter {
    fn name(&self) -> &str {
        self.workflow.name()
    }

    fn role(&self) -> ActorRole {
        ActorRole::Writer
    }

    fn is_initialized(&self) -> bool {
        self.workflow.is_initialized()
    }

    async fn initialize(&self) -> Outcome<()> {
        open(&self.workflow, &self.store, &self.config).await
    }

    async fn cleanup(&self) -> Outcome<()> {
        close(&self.workflow).await
    }

    fn status(&self) -> ActorStatus {
        self.workflow
            .status()
            .with_metadata("url", &self.config.url)
            .with_metadata("tablePrefix", &self.config.table_prefix)
            .with_metadata("poolSize", self.config.pool_size)
    }
}

#[async_trait]
impl MarketDataWriter for StoreWriter {
    async fn publish_price(&self, price: &PricePoint) -> Outcome<WriteReceipt> {
        let op = InsertOne::<PricePoint>::new("publish_price", price_key, PricePoint::is_valid);
        self.insert_one(op, PRICES_TABLE, price).await
    }

    async fn publish_prices(&self, prices: &[PricePoint]) -> Outcome<WriteReceipt> {
        let op = InsertBatch::<PricePoint>::new("publish_prices", price_key, PricePoint::is_valid);
        self.insert_many(op, PRICES_TABLE, prices).await
    }

    async fn publish_candles(&self, candles: &[OhlcvCandle]) -> Outcome<WriteReceipt> {
        let op = InsertBatch::<OhlcvCandle>::new("publish_candles", candle_key, OhlcvCandle::is_consistent);
        self.insert_many(op, CANDLES_TABLE, candles).await
    }

    async fn publish_analytics(&self, snapshot: &MarketAnalyticsSnapshot) -> Outcome<WriteReceipt> {
        let op = InsertOne::<MarketAnalyticsSnapshot>::new("publish_analytics", analytics_key, MarketAnalyticsSnapshot::is_valid);
        self.insert_one(op, ANALYTICS_TABLE, snapshot).await
    }

    async fn publish_top_of_book(&self, quote: &TopOfBook) -> Outcome<WriteReceipt> {
        let op = InsertOne::<TopOfBook>::new("publish_top_of_book", top_of_book_key, TopOfBook::is_uncrossed);
        self.insert_one(op, TOP_OF_BOOK_TABLE, quote).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use relay_core::error::codes;

    use super::*;
    use crate::store::MemoryStore;

    fn snapshot(at: DateTime<Utc>, btc_dominance: f64) -> MarketAnalyticsSnapshot {
        MarketAnalyticsSnapshot {
            timestamp: at,
            total_market_cap: 2.5e12,
            total_volume: 9.0e10,
            btc_dominance,
            eth_dominance: Some(16.0),
            active_cryptocurrencies: 13_000,
            markets: 1_000,
            market_cap_change_24h: 0.5,
            source: "coingecko".into(),
            attribution: "Data provided by CoinGecko".into(),
        }
    }

    fn price(coin: &str, at: DateTime<Utc>) -> PricePoint {
        PricePoint {
            coin_id: coin.into(),
            symbol: coin.to_uppercase(),
            name: coin.into(),
            usd_price: 10.0,
            btc_price: None,
            market_cap: None,
            volume_24h: None,
            change_24h: None,
            last_updated: at,
            source: "coingecko".into(),
            attribution: "Data provided by CoinGecko".into(),
        }
    }

    async fn ready(store: Arc<MemoryStore>) -> StoreWriter {
        let writer = StoreWriter::new(StoreConfig::new("tsdb"), store);
        assert!(writer.initialize().await.is_success());
        writer
    }

    #[tokio::test]
    async fn analytics_row_lands_in_prefixed_table() {
        let store = Arc::new(MemoryStore::new());
        let writer = ready(Arc::clone(&store)).await;
        let receipt = writer.publish_analytics(&snapshot(Utc::now(), 52.0)).await.into_result().unwrap();
        assert_eq!(receipt.destination, "crypto_analytics");
        assert_eq!(receipt.records, 1);
        assert_eq!(store.row_count("crypto_analytics"), 1);
    }

    #[tokio::test]
    async fn duplicate_single_row_fails_validation() {
        let store = Arc::new(MemoryStore::new());
        let writer = ready(store).await;
        let at = Utc::now();
        assert!(writer.publish_analytics(&snapshot(at, 52.0)).await.is_success());
        let out = writer.publish_analytics(&snapshot(at, 53.0)).await;
        assert_eq!(out.code(), Some(codes::VALIDATION_FAILED));
        assert_eq!(writer.status().total_operations, 1);
    }

    #[tokio::test]
    async fn invalid_snapshot_is_refused_up_front() {
        let store = Arc::new(MemoryStore::new());
        let writer = ready(Arc::clone(&store)).await;
        let out = writer.publish_analytics(&snapshot(Utc::now(), 140.0)).await;
        assert_eq!(out.code(), Some(codes::VALIDATION_FAILED));
        assert_eq!(store.row_count("crypto_analytics"), 0);
    }

    #[tokio::test]
    async fn batch_keeps_new_rows_only() {
        let store = Arc::new(MemoryStore::new());
        let writer = ready(Arc::clone(&store)).await;
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(60);

        let receipt = writer.publish_prices(&[price("bitcoin", t0), price("ethereum", t0)]).await.into_result().unwrap();
        assert_eq!(receipt.records, 2);

        let receipt = writer.publish_prices(&[price("bitcoin", t0), price("bitcoin", t1)]).await.into_result().unwrap();
        assert_eq!(receipt.records, 1);
        assert_eq!(store.row_count("crypto_prices"), 3);

        let out = writer.publish_prices(&[price("bitcoin", t1)]).await;
        assert_eq!(out.code(), Some(codes::NO_VALID_DATA));
        assert_eq!(writer.status().error_count, 1);
    }

    #[tokio::test]
    async fn outage_is_network_failure() {
        let store = Arc::new(MemoryStore::new());
        let writer = ready(Arc::clone(&store)).await;
        store.set_available(false);
        let out = writer.publish_prices(&[price("bitcoin", Utc::now())]).await;
        let err = out.error().unwrap();
        assert_eq!(err.code, "PUBLISH_PRICES_FAILED");
        assert_eq!(err.category, ErrorCategory::Network);
        assert_eq!(writer.status().registered_clients[0].error_count, 1);
    }
}
