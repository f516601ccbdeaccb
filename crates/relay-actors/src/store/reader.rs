//! Time-series store reader.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::config::StoreConfig;
use relay_core::workflow::{BatchOperation, Operation, Workflow};
use relay_core::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{
    ANALYTICS_SERIES, ANALYTICS_TABLE, CANDLES_TABLE, PRICES_TABLE, Row, RowFilter, StoreConnection, TOP_OF_BOOK_TABLE,
    TimeSeriesStore, close, decode, open,
};

/// Upper bound on rows returned by one range query.
const MAX_QUERY_ROWS: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct SeriesArgs {
    pub table: String,
    pub series: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs_currency: Option<String>,
}

/// Latest row of one series.
pub struct LatestRow<T> {
    name: &'static str,
    accept: fn(&T) -> bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LatestRow<T> {
    pub fn new(name: &'static str, accept: fn(&T) -> bool) -> Self {
        Self { name, accept, _marker: PhantomData }
    }
}

#[async_trait]
impl<T> Operation<StoreConnection> for LatestRow<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Args = SeriesArgs;
    type Raw = Option<Row>;
    type Output = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &SeriesArgs) -> Result<(), String> {
        if args.series.trim().is_empty() {
            return Err("series must not be empty".into());
        }
        args.vs_currency.as_deref().map_or(Ok(()), ensure_usd_quote)
    }

    async fn plugin(&self, conn: &StoreConnection, args: &SeriesArgs) -> Result<Option<Row>> {
        conn.store.latest(&conn.conn_id, &args.table, &args.series).await
    }

    fn validate(&self, raw: &Option<Row>) -> bool {
        raw.as_ref().and_then(|r| decode::<T>(r).ok()).is_some_and(|v| (self.accept)(&v))
    }

    fn transform(&self, raw: Option<Row>, args: &SeriesArgs) -> Result<T> {
        let row = raw.ok_or_else(|| anyhow!("no row for '{}' in {}", args.series, args.table))?;
        decode(&row)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManySeriesArgs {
    pub table: String,
    pub series: Vec<String>,
    pub vs_currency: String,
}

/// Latest row of each requested series; series without a row are dropped.
pub struct LatestRows<T> {
    name: &'static str,
    accept: fn(&T) -> bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LatestRows<T> {
    pub fn new(name: &'static str, accept: fn(&T) -> bool) -> Self {
        Self { name, accept, _marker: PhantomData }
    }
}

#[async_trait]
impl<T> BatchOperation<StoreConnection> for LatestRows<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Args = ManySeriesArgs;
    type Item = Option<Row>;
    type Output = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &ManySeriesArgs) -> Result<(), String> {
        if args.series.is_empty() {
            return Err("series must not be empty".into());
        }
        ensure_usd_quote(&args.vs_currency)
    }

    async fn plugin(&self, conn: &StoreConnection, args: &ManySeriesArgs) -> Result<Vec<Option<Row>>> {
        let mut rows = Vec::with_capacity(args.series.len());
        for series in &args.series {
            rows.push(conn.store.latest(&conn.conn_id, &args.table, series).await?);
        }
        Ok(rows)
    }

    fn validate_item(&self, item: &Option<Row>) -> bool {
        item.as_ref().and_then(|r| decode::<T>(r).ok()).is_some_and(|v| (self.accept)(&v))
    }

    fn transform_item(&self, item: Option<Row>, _args: &ManySeriesArgs) -> Result<T> {
        let row = item.ok_or_else(|| anyhow!("missing row"))?;
        decode(&row)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeArgs {
    pub table: String,
    pub series: String,
    pub since: DateTime<Utc>,
    pub vs_currency: String,
}

/// All rows of one series since a point in time, oldest first.
pub struct Range<T> {
    name: &'static str,
    accept: fn(&T) -> bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Range<T> {
    pub fn new(name: &'static str, accept: fn(&T) -> bool) -> Self {
        Self { name, accept, _marker: PhantomData }
    }
}

#[async_trait]
impl<T> BatchOperation<StoreConnection> for Range<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Args = RangeArgs;
    type Item = Row;
    type Output = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &RangeArgs) -> Result<(), String> {
        if args.series.trim().is_empty() {
            return Err("series must not be empty".into());
        }
        ensure_usd_quote(&args.vs_currency)
    }

    async fn plugin(&self, conn: &StoreConnection, args: &RangeArgs) -> Result<Vec<Row>> {
        let filter = RowFilter { series: vec![args.series.clone()], since: Some(args.since), limit: Some(MAX_QUERY_ROWS) };
        conn.store.query(&conn.conn_id, &args.table, &filter).await
    }

    fn validate_item(&self, item: &Row) -> bool {
        decode::<T>(item).is_ok_and(|v| (self.accept)(&v))
    }

    fn transform_item(&self, item: Row, _args: &RangeArgs) -> Result<T> {
        decode(&item)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub struct StoreReader {
    config: StoreConfig,
    store: Arc<dyn TimeSeriesStore>,
    workflow: Workflow<StoreConnection>,
}

impl StoreReader {
    pub fn new(config: StoreConfig, store: Arc<dyn TimeSeriesStore>) -> Self {
        let workflow = Workflow::new(format!("store-reader:{}", config.key), ActorRole::Reader);
        Self { config, store, workflow }
    }

    fn series_args(&self, table: &str, series: &str, vs_currency: Option<&str>) -> SeriesArgs {
        SeriesArgs {
            table: self.config.table(table),
            series: series.to_string(),
            vs_currency: vs_currency.map(str::to_string),
        }
    }
}

#[async_trait]
impl Actor for StoreReader {
    fn name(&self) -> &str {
        self.workflow.name()
    }

    fn role(&self) -> ActorRole {
        ActorRole::Reader
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
impl MarketDataReader for StoreReader {
    async fn get_current_price(&self, coin_id: &str, vs_currency: &str) -> Outcome<PricePoint> {
        let op = LatestRow::<PricePoint>::new("get_current_price", PricePoint::is_valid);
        self.workflow.execute(&op, self.series_args(PRICES_TABLE, coin_id, Some(vs_currency)), None).await
    }

    async fn get_current_prices(&self, coin_ids: &[String], vs_currency: &str) -> Outcome<Vec<PricePoint>> {
        let op = LatestRows::<PricePoint>::new("get_current_prices", PricePoint::is_valid);
        let args = ManySeriesArgs {
            table: self.config.table(PRICES_TABLE),
            series: coin_ids.to_vec(),
            vs_currency: vs_currency.to_string(),
        };
        self.workflow.execute_batch(&op, args, None).await
    }

    async fn get_ohlcv(&self, coin_id: &str, vs_currency: &str, days: u32) -> Outcome<Vec<OhlcvCandle>> {
        let op = Range::<OhlcvCandle>::new("get_ohlcv", OhlcvCandle::is_consistent);
        let args = RangeArgs {
            table: self.config.table(CANDLES_TABLE),
            series: coin_id.to_string(),
            since: window_start(Utc::now(), days),
            vs_currency: vs_currency.to_string(),
        };
        self.workflow.execute_batch(&op, args, None).await
    }

    async fn get_market_analytics(&self) -> Outcome<MarketAnalyticsSnapshot> {
        let op = LatestRow::<MarketAnalyticsSnapshot>::new("get_market_analytics", MarketAnalyticsSnapshot::is_valid);
        self.workflow.execute(&op, self.series_args(ANALYTICS_TABLE, ANALYTICS_SERIES, None), None).await
    }

    async fn get_top_of_book(&self, ticker: &str) -> Outcome<TopOfBook> {
        let op = LatestRow::<TopOfBook>::new("get_top_of_book", TopOfBook::is_uncrossed);
        self.workflow.execute(&op, self.series_args(TOP_OF_BOOK_TABLE, ticker, None), None).await
    }
}
