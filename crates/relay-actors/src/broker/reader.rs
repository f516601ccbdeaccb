//! Broker reader: serves canonical values republished on broker topics.
//!
//! Single-value lookups (`get_current_price`, `get_market_analytics`,
//! `get_top_of_book`) read the latest record for a key without moving any
//! offset. Batch reads (`get_current_prices`, `get_ohlcv`) consume through
//! the configured consumer group, so each record is delivered once per group.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use relay_core::config::BrokerConfig;
use relay_core::workflow::{BatchOperation, Operation, Workflow};
use relay_core::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ANALYTICS_KEY, Broker, BrokerConnection, BrokerRecord, close, decode, open};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LatestArgs {
    pub topic: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs_currency: Option<String>,
}

/// Latest record for a key, decoded as `T`.
pub struct Latest<T> {
    name: &'static str,
    accept: fn(&T) -> bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Latest<T> {
    pub fn new(name: &'static str, accept: fn(&T) -> bool) -> Self {
        Self { name, accept, _marker: PhantomData }
    }
}

#[async_trait]
impl<T> Operation<BrokerConnection> for Latest<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Args = LatestArgs;
    type Raw = Option<BrokerRecord>;
    type Output = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &LatestArgs) -> Result<(), String> {
        if args.key.trim().is_empty() {
            return Err("key must not be empty".into());
        }
        args.vs_currency.as_deref().map_or(Ok(()), ensure_usd_quote)
    }

    async fn plugin(&self, conn: &BrokerConnection, args: &LatestArgs) -> Result<Option<BrokerRecord>> {
        conn.broker.latest(&conn.client_id, &args.topic, &args.key).await
    }

    /// A missing record or an undecodable payload both fail validation.
    fn validate(&self, raw: &Option<BrokerRecord>) -> bool {
        raw.as_ref().and_then(|r| decode::<T>(r).ok()).is_some_and(|v| (self.accept)(&v))
    }

    fn transform(&self, raw: Option<BrokerRecord>, args: &LatestArgs) -> Result<T> {
        let record = raw.ok_or_else(|| anyhow!("no record for '{}' on {}", args.key, args.topic))?;
        decode(&record)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumeArgs {
    pub topic: String,
    pub group: String,
    pub max: usize,
    /// Record keys to keep; empty keeps everything.
    pub keys: Vec<String>,
    pub vs_currency: String,
}

type Accept<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Poll the group and decode every kept record as `T`. Records whose payload
/// does not decode, or that `accept` refuses, are dropped.
pub struct Consume<T> {
    name: &'static str,
    accept: Accept<T>,
}

impl<T> Consume<T> {
    pub fn new(name: &'static str, accept: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self { name, accept: Box::new(accept) }
    }
}

#[async_trait]
impl<T> BatchOperation<BrokerConnection> for Consume<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Args = ConsumeArgs;
    type Item = BrokerRecord;
    type Output = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &ConsumeArgs) -> Result<(), String> {
        if args.max == 0 {
            return Err("max must be > 0".into());
        }
        ensure_usd_quote(&args.vs_currency)
    }

    async fn plugin(&self, conn: &BrokerConnection, args: &ConsumeArgs) -> Result<Vec<BrokerRecord>> {
        let mut records = conn.broker.poll(&conn.client_id, &args.topic, &args.group, args.max).await?;
        if !args.keys.is_empty() {
            records.retain(|r| r.key.as_ref().is_some_and(|k| args.keys.contains(k)));
        }
        Ok(records)
    }

    fn validate_item(&self, item: &BrokerRecord) -> bool {
        decode::<T>(item).is_ok_and(|v| (self.accept)(&v))
    }

    fn transform_item(&self, item: BrokerRecord, _args: &ConsumeArgs) -> Result<T> {
        decode(&item)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub struct BrokerReader {
    config: BrokerConfig,
    broker: Arc<dyn Broker>,
    workflow: Workflow<BrokerConnection>,
}

impl BrokerReader {
    pub fn new(config: BrokerConfig, broker: Arc<dyn Broker>) -> Self {
        let workflow = Workflow::new(format!("broker-reader:{}", config.key), ActorRole::Reader);
        Self { config, broker, workflow }
    }

    fn latest_args(&self, topic: &str, key: &str, vs_currency: Option<&str>) -> LatestArgs {
        LatestArgs { topic: topic.to_string(), key: key.to_string(), vs_currency: vs_currency.map(str::to_string) }
    }

    fn consume_args(&self, topic: &str, keys: Vec<String>, vs_currency: &str) -> ConsumeArgs {
        ConsumeArgs {
            topic: topic.to_string(),
            group: self.config.group_id.clone(),
            max: self.config.max_poll_records,
            keys,
            vs_currency: vs_currency.to_string(),
        }
    }
}

#[async_trait]
impl Actor for BrokerReader {
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
        open(&self.workflow, &self.broker, &self.config).await
    }

    async fn cleanup(&self) -> Outcome<()> {
        close(&self.workflow).await
    }

    fn status(&self) -> ActorStatus {
        self.workflow
            .status()
            .with_metadata("brokers", &self.config.brokers)
            .with_metadata("topics", &self.config.topics)
            .with_metadata("groupId", &self.config.group_id)
    }
}

#[async_trait]
impl MarketDataReader for BrokerReader {
    async fn get_current_price(&self, coin_id: &str, vs_currency: &str) -> Outcome<PricePoint> {
        let op = Latest::<PricePoint>::new("get_current_price", PricePoint::is_valid);
        let args = self.latest_args(&self.config.topics.prices, coin_id, Some(vs_currency));
        self.workflow.execute(&op, args, None).await
    }

    async fn get_current_prices(&self, coin_ids: &[String], vs_currency: &str) -> Outcome<Vec<PricePoint>> {
        let op = Consume::<PricePoint>::new("get_current_prices", PricePoint::is_valid);
        let args = self.consume_args(&self.config.topics.prices, coin_ids.to_vec(), vs_currency);
        self.workflow.execute_batch(&op, args, None).await
    }

    async fn get_ohlcv(&self, coin_id: &str, vs_currency: &str, days: u32) -> Outcome<Vec<OhlcvCandle>> {
        let since = window_start(Utc::now(), days);
        let coin = coin_id.to_string();
        let op = Consume::<OhlcvCandle>::new("get_ohlcv", move |c: &OhlcvCandle| {
            c.coin_id == coin && c.timestamp >= since && c.is_consistent()
        });
        let args = self.consume_args(&self.config.topics.candles, vec![coin_id.to_string()], vs_currency);
        self.workflow.execute_batch(&op, args, None).await
    }

    async fn get_market_analytics(&self) -> Outcome<MarketAnalyticsSnapshot> {
        let op = Latest::<MarketAnalyticsSnapshot>::new("get_market_analytics", MarketAnalyticsSnapshot::is_valid);
        let args = self.latest_args(&self.config.topics.analytics, ANALYTICS_KEY, None);
        self.workflow.execute(&op, args, None).await
    }

    async fn get_top_of_book(&self, ticker: &str) -> Outcome<TopOfBook> {
        let op = Latest::<TopOfBook>::new("get_top_of_book", TopOfBook::is_uncrossed);
        let args = self.latest_args(&self.config.topics.top_of_book, ticker, None);
        self.workflow.execute(&op, args, None).await
    }
}
