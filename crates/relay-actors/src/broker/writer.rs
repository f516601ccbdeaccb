//! Broker writer: publishes canonical values as camelCase JSON records.
//!
//! | Value                     | Topic                  | Key        |
//! |---------------------------|------------------------|------------|
//! | `PricePoint`              | `topics.prices`        | coin id    |
//! | `OhlcvCandle`             | `topics.candles`       | coin id    |
//! | `MarketAnalyticsSnapshot` | `topics.analytics`     | `"global"` |
//! | `TopOfBook`               | `topics.top_of_book`   | ticker     |

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use relay_core::config::BrokerConfig;
use relay_core::workflow::{BatchOperation, Operation, Workflow};
use relay_core::*;
use serde::Serialize;

use super::{ANALYTICS_KEY, Broker, BrokerConnection, DeliveryReport, OutgoingRecord, close, open};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PublishArgs<T> {
    pub topic: String,
    pub key: String,
    pub value: T,
}

/// Publish one value. A record the broker refuses fails validation.
pub struct PublishOne<T> {
    name: &'static str,
    accept: fn(&T) -> bool,
}

impl<T> PublishOne<T> {
    pub fn new(name: &'static str, accept: fn(&T) -> bool) -> Self {
        Self { name, accept }
    }
}

#[async_trait]
impl<T> Operation<BrokerConnection> for PublishOne<T>
where
    T: Serialize + Send + Sync + 'static,
{
    type Args = PublishArgs<T>;
    type Raw = DeliveryReport;
    type Output = DeliveryReport;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &PublishArgs<T>) -> Result<(), String> {
        if (self.accept)(&args.value) { Ok(()) } else { Err(format!("refusing to publish an invalid record for '{}'", args.key)) }
    }

    async fn plugin(&self, conn: &BrokerConnection, args: &PublishArgs<T>) -> Result<DeliveryReport> {
        let record = encode(&args.key, &args.value)?;
        let reports = conn.broker.publish(&conn.client_id, &args.topic, vec![record]).await?;
        reports.into_iter().next().ok_or_else(|| anyhow!("broker returned no delivery report"))
    }

    fn validate(&self, raw: &DeliveryReport) -> bool {
        raw.is_delivered()
    }

    fn transform(&self, raw: DeliveryReport, _args: &PublishArgs<T>) -> Result<DeliveryReport> {
        Ok(raw)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishBatchArgs<T> {
    pub topic: String,
    pub values: Vec<T>,
}

/// Publish many values in one call. Values failing `accept` are never sent
/// and come back as refused reports, alongside whatever the broker refused.
pub struct PublishBatch<T> {
    name: &'static str,
    key_of: fn(&T) -> String,
    accept: fn(&T) -> bool,
}

impl<T> PublishBatch<T> {
    pub fn new(name: &'static str, key_of: fn(&T) -> String, accept: fn(&T) -> bool) -> Self {
        Self { name, key_of, accept }
    }
}

#[async_trait]
impl<T> BatchOperation<BrokerConnection> for PublishBatch<T>
where
    T: Serialize + Send + Sync + 'static,
{
    type Args = PublishBatchArgs<T>;
    type Item = DeliveryReport;
    type Output = DeliveryReport;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_args(&self, args: &PublishBatchArgs<T>) -> Result<(), String> {
        if args.values.is_empty() { Err("nothing to publish".into()) } else { Ok(()) }
    }

    async fn plugin(&self, conn: &BrokerConnection, args: &PublishBatchArgs<T>) -> Result<Vec<DeliveryReport>> {
        let mut refused = Vec::new();
        let mut records = Vec::with_capacity(args.values.len());
        for value in &args.values {
            let key = (self.key_of)(value);
            if (self.accept)(value) {
                records.push(encode(&key, value)?);
            } else {
                refused.push(DeliveryReport { key, offset: None, error: Some("invalid record".into()) });
            }
        }

        let mut reports =
            if records.is_empty() { Vec::new() } else { conn.broker.publish(&conn.client_id, &args.topic, records).await? };
        reports.extend(refused);
        Ok(reports)
    }

    fn validate_item(&self, item: &DeliveryReport) -> bool {
        item.is_delivered()
    }

    fn transform_item(&self, item: DeliveryReport, _args: &PublishBatchArgs<T>) -> Result<DeliveryReport> {
        Ok(item)
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<OutgoingRecord> {
    let payload = serde_json::to_vec(value).with_context(|| format!("failed to encode record '{key}'"))?;
    Ok(OutgoingRecord { key: key.to_string(), payload })
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub struct BrokerWriter {
    config: BrokerConfig,
    broker: Arc<dyn Broker>,
    workflow: Workflow<BrokerConnection>,
}

impl BrokerWriter {
    pub fn new(config: BrokerConfig, broker: Arc<dyn Broker>) -> Self {
        let workflow = Workflow::new(format!("broker-writer:{}", config.key), ActorRole::Writer);
        Self { config, broker, workflow }
    }

    fn receipt(&self, topic: &str, records: usize) -> WriteReceipt {
        WriteReceipt {
            destination: topic.to_string(),
            records: records as u64,
            source: self.workflow.name().to_string(),
            timestamp: Utc::now(),
        }
    }

    async fn publish_one<T>(&self, name: &'static str, topic: &str, key: &str, value: &T, accept: fn(&T) -> bool) -> Outcome<WriteReceipt>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let args = PublishArgs { topic: topic.to_string(), key: key.to_string(), value: value.clone() };
        self.workflow.execute(&PublishOne::new(name, accept), args, None).await.map(|_| self.receipt(topic, 1))
    }

    async fn publish_many<T>(
        &self,
        name: &'static str,
        topic: &str,
        values: &[T],
        key_of: fn(&T) -> String,
        accept: fn(&T) -> bool,
    ) -> Outcome<WriteReceipt>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let args = PublishBatchArgs { topic: topic.to_string(), values: values.to_vec() };
        self.workflow
            .execute_batch(&PublishBatch::new(name, key_of, accept), args, None)
            .await
            .map(|delivered| self.receipt(topic, delivered.len()))
    }
}

#[async_trait]
impl Actor for BrokerWriter {
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
        open(&self.workflow, &self.broker, &self.config).await
    }

    async fn cleanup(&self) -> Outcome<()> {
        close(&self.workflow).await
    }

    fn status(&self) -> ActorStatus {
        self.workflow.status().with_metadata("brokers", &self.config.brokers).with_metadata("topics", &self.config.topics)
    }
}

#[async_trait]
impl MarketDataWriter for BrokerWriter {
    async fn publish_price(&self, price: &PricePoint) -> Outcome<WriteReceipt> {
        self.publish_one("publish_price", &self.config.topics.prices, &price.coin_id, price, PricePoint::is_valid).await
    }

    async fn publish_prices(&self, prices: &[PricePoint]) -> Outcome<WriteReceipt> {
        self.publish_many("publish_prices", &self.config.topics.prices, prices, |p| p.coin_id.clone(), PricePoint::is_valid)
            .await
    }

    async fn publish_candles(&self, candles: &[OhlcvCandle]) -> Outcome<WriteReceipt> {
        self.publish_many(
            "publish_candles",
            &self.config.topics.candles,
            candles,
            |c| c.coin_id.clone(),
            OhlcvCandle::is_consistent,
        )
        .await
    }

    async fn publish_analytics(&self, snapshot: &MarketAnalyticsSnapshot) -> Outcome<WriteReceipt> {
        self.publish_one(
            "publish_analytics",
            &self.config.topics.analytics,
            ANALYTICS_KEY,
            snapshot,
            MarketAnalyticsSnapshot::is_valid,
        )
        .await
    }

    async fn publish_top_of_book(&self, quote: &TopOfBook) -> Outcome<WriteReceipt> {
        self.publish_one("publish_top_of_book", &self.config.topics.top_of_book, &quote.ticker, quote, TopOfBook::is_uncrossed)
            .await
    }
}
