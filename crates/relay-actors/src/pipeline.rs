//! Relay pipeline: one tick reads from every reader and fans the results out
//! to every writer.
//!
//! ```text
//! reader ──get_current_prices──► writers.publish_prices
//!        ──get_ohlcv (per coin)─► writers.publish_candles
//!        ──get_market_analytics─► writers.publish_analytics
//! ```
//!
//! Failures never abort a tick; each outcome is logged and counted in the
//! returned [`TickReport`]. Operations a reader or writer does not support
//! are skipped silently.

use relay_core::config::RelaySettings;
use relay_core::error::codes;
use relay_core::*;
use tracing::{debug, info, warn};

use crate::registry::ActorSet;

/// Counters for one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub reads_ok: u64,
    pub reads_failed: u64,
    pub writes_ok: u64,
    pub writes_failed: u64,
    /// Records accepted across all writers.
    pub records_written: u64,
}

pub struct Relay {
    settings: RelaySettings,
    actors: ActorSet,
}

impl Relay {
    pub fn new(settings: RelaySettings, actors: ActorSet) -> Self {
        Self { settings, actors }
    }

    pub fn actors(&self) -> &ActorSet {
        &self.actors
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Run one relay pass.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let vs = self.settings.vs_currency.as_str();

        for reader in &self.actors.readers {
            let source = reader.name();

            let prices = reader.get_current_prices(&self.settings.coins, vs).await;
            if let Some(prices) = read(&mut report, source, "prices", prices) {
                for writer in &self.actors.writers {
                    write(&mut report, writer.name(), "prices", writer.publish_prices(&prices).await);
                }
            }

            for coin in &self.settings.coins {
                let candles = reader.get_ohlcv(coin, vs, self.settings.ohlcv_days).await;
                if let Some(candles) = read(&mut report, source, "candles", candles) {
                    for writer in &self.actors.writers {
                        write(&mut report, writer.name(), "candles", writer.publish_candles(&candles).await);
                    }
                }
            }

            let analytics = reader.get_market_analytics().await;
            if let Some(snapshot) = read(&mut report, source, "analytics", analytics) {
                for writer in &self.actors.writers {
                    write(&mut report, writer.name(), "analytics", writer.publish_analytics(&snapshot).await);
                }
            }
        }

        info!(
            "tick: reads ok={} failed={}, writes ok={} failed={}, records={}",
            report.reads_ok, report.reads_failed, report.writes_ok, report.writes_failed, report.records_written
        );
        report
    }
}

fn is_unsupported<T>(outcome: &Outcome<T>) -> bool {
    outcome.code() == Some(codes::UNSUPPORTED_OPERATION)
}

fn read<T>(report: &mut TickReport, actor: &str, what: &str, outcome: Outcome<T>) -> Option<T> {
    if is_unsupported(&outcome) {
        debug!("[{actor}] {what}: not supported, skipped");
        return None;
    }
    match outcome {
        Outcome::Success(value) => {
            report.reads_ok += 1;
            Some(value)
        }
        Outcome::Failure(e) => {
            report.reads_failed += 1;
            warn!("[{actor}] read {what} failed: {} ({})", e.message, e.code);
            None
        }
    }
}

fn write(report: &mut TickReport, actor: &str, what: &str, outcome: Outcome<WriteReceipt>) {
    if is_unsupported(&outcome) {
        debug!("[{actor}] {what}: not supported, skipped");
        return;
    }
    match outcome {
        Outcome::Success(receipt) => {
            report.writes_ok += 1;
            report.records_written += receipt.records;
            debug!("[{actor}] wrote {} {what} record(s) to {}", receipt.records, receipt.destination);
        }
        Outcome::Failure(e) => {
            report.writes_failed += 1;
            warn!("[{actor}] write {what} failed: {} ({})", e.message, e.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use relay_core::config::{BrokerConfig, StoreConfig};

    use super::*;
    use crate::broker::{Broker, BrokerReader, MemoryBroker, OutgoingRecord};
    use crate::store::{MemoryStore, StoreWriter};

    fn price(coin: &str, usd: f64) -> PricePoint {
        PricePoint {
            coin_id: coin.into(),
            symbol: coin.to_uppercase(),
            name: coin.into(),
            usd_price: usd,
            btc_price: None,
            market_cap: None,
            volume_24h: None,
            change_24h: None,
            last_updated: Utc::now(),
            source: "coingecko".into(),
            attribution: "Data provided by CoinGecko".into(),
        }
    }

    #[tokio::test]
    async fn broker_prices_reach_the_store() {
        let broker = Arc::new(MemoryBroker::new());
        broker.connect("feed").await.unwrap();
        let records = ["bitcoin", "ethereum"]
            .iter()
            .map(|c| OutgoingRecord { key: c.to_string(), payload: serde_json::to_vec(&price(c, 100.0)).unwrap() })
            .collect();
        broker.publish("feed", "crypto.prices", records).await.unwrap();

        let store = Arc::new(MemoryStore::new());
        let actors = ActorSet {
            readers: vec![Arc::new(BrokerReader::new(BrokerConfig::new("bus"), broker))],
            writers: vec![Arc::new(StoreWriter::new(StoreConfig::new("tsdb"), store.clone()))],
        };
        assert_eq!(actors.initialize_all().await, 2);

        let relay = Relay::new(RelaySettings::default(), actors);
        let report = relay.tick().await;

        assert_eq!(store.row_count("crypto_prices"), 2);
        assert_eq!(report.writes_ok, 1);
        assert_eq!(report.records_written, 2);
        // no candles or analytics were ever published
        assert_eq!(report.reads_ok, 1);
        assert_eq!(report.reads_failed, 3);
    }

    #[tokio::test]
    async fn uninitialized_readers_only_count_failures() {
        let actors = ActorSet {
            readers: vec![Arc::new(BrokerReader::new(BrokerConfig::new("bus"), Arc::new(MemoryBroker::new())))],
            writers: Vec::new(),
        };
        let report = Relay::new(RelaySettings::default(), actors).tick().await;
        assert_eq!(report.reads_ok, 0);
        // prices + ohlcv per default coin + analytics
        assert_eq!(report.reads_failed, 4);
        assert_eq!(report.writes_ok + report.writes_failed, 0);
    }
}
