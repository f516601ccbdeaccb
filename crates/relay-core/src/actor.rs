//! Actor lifecycle and DSL traits.
//!
//! Every backend integration (source or sink) implements [`Actor`] plus
//! [`MarketDataReader`] or [`MarketDataWriter`]. Operations a backend cannot
//! serve fall back to the default bodies, which return
//! `UNSUPPORTED_OPERATION` rather than panicking. Before `initialize()` and
//! after `cleanup()` they report `*_NOT_INITIALIZED` like every other
//! operation.
//!
//! # Lifecycle
//!
//! 1. Construct via the actor's `new(config, ...)`.
//! 2. [`initialize`](Actor::initialize) connects and registers at least one
//!    connected client.
//! 3. DSL operations.
//! 4. [`cleanup`](Actor::cleanup) disconnects every registered client.
//!
//! All methods take `&self`; actors are shared behind `Arc` and may be driven
//! from several tasks at once.

use async_trait::async_trait;

use crate::activity::ActorStatus;
use crate::error::DomainError;
use crate::outcome::Outcome;
use crate::types::*;

/// Lifecycle shared by readers and writers.
#[async_trait]
pub trait Actor: Send + Sync {
    /// Human-readable actor name (also the log prefix).
    fn name(&self) -> &str;

    fn role(&self) -> ActorRole;

    /// Connect to the backend and register the connection.
    async fn initialize(&self) -> Outcome<()>;

    /// Disconnect and unregister every client.
    async fn cleanup(&self) -> Outcome<()>;

    fn is_initialized(&self) -> bool;

    fn status(&self) -> ActorStatus;

    /// Failure for a DSL operation this actor has no backend for.
    fn unsupported(&self, operation: &str) -> DomainError {
        if self.is_initialized() {
            DomainError::unsupported(self.name(), operation)
        } else {
            DomainError::not_initialized(self.role().not_initialized_code(), self.name(), operation)
        }
    }
}

/// Source-side DSL.
#[async_trait]
pub trait MarketDataReader: Actor {
    async fn get_current_price(&self, coin_id: &str, vs_currency: &str) -> Outcome<PricePoint> {
        let _ = (coin_id, vs_currency);
        Outcome::Failure(self.unsupported("get_current_price"))
    }

    /// Batch: invalid entries are dropped.
    async fn get_current_prices(&self, coin_ids: &[String], vs_currency: &str) -> Outcome<Vec<PricePoint>> {
        let _ = (coin_ids, vs_currency);
        Outcome::Failure(self.unsupported("get_current_prices"))
    }

    /// Batch: candles covering the last `days` days, oldest first.
    async fn get_ohlcv(&self, coin_id: &str, vs_currency: &str, days: u32) -> Outcome<Vec<OhlcvCandle>> {
        let _ = (coin_id, vs_currency, days);
        Outcome::Failure(self.unsupported("get_ohlcv"))
    }

    async fn get_market_analytics(&self) -> Outcome<MarketAnalyticsSnapshot> {
        Outcome::Failure(self.unsupported("get_market_analytics"))
    }

    async fn get_top_of_book(&self, ticker: &str) -> Outcome<TopOfBook> {
        let _ = ticker;
        Outcome::Failure(self.unsupported("get_top_of_book"))
    }
}

/// Sink-side DSL.
#[async_trait]
pub trait MarketDataWriter: Actor {
    async fn publish_price(&self, price: &PricePoint) -> Outcome<WriteReceipt> {
        let _ = price;
        Outcome::Failure(self.unsupported("publish_price"))
    }

    /// Batch: invalid prices are dropped.
    async fn publish_prices(&self, prices: &[PricePoint]) -> Outcome<WriteReceipt> {
        let _ = prices;
        Outcome::Failure(self.unsupported("publish_prices"))
    }

    /// Batch: inconsistent candles are dropped.
    async fn publish_candles(&self, candles: &[OhlcvCandle]) -> Outcome<WriteReceipt> {
        let _ = candles;
        Outcome::Failure(self.unsupported("publish_candles"))
    }

    async fn publish_analytics(&self, snapshot: &MarketAnalyticsSnapshot) -> Outcome<WriteReceipt> {
        let _ = snapshot;
        Outcome::Failure(self.unsupported("publish_analytics"))
    }

    async fn publish_top_of_book(&self, quote: &TopOfBook) -> Outcome<WriteReceipt> {
        let _ = quote;
        Outcome::Failure(self.unsupported("publish_top_of_book"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::error::codes;

    /// An actor that serves nothing, in either role.
    struct Bare {
        role: ActorRole,
        up: AtomicBool,
    }

    impl Bare {
        fn new(role: ActorRole) -> Self {
            Self { role, up: AtomicBool::new(false) }
        }
    }

    #[async_trait]
    impl Actor for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        fn role(&self) -> ActorRole {
            self.role
        }

        async fn initialize(&self) -> Outcome<()> {
            self.up.store(true, Ordering::Release);
            Outcome::Success(())
        }

        async fn cleanup(&self) -> Outcome<()> {
            self.up.store(false, Ordering::Release);
            Outcome::Success(())
        }

        fn is_initialized(&self) -> bool {
            self.up.load(Ordering::Acquire)
        }

        fn status(&self) -> ActorStatus {
            ActorStatus {
                name: self.name().to_string(),
                role: self.role,
                is_initialized: self.is_initialized(),
                is_connected: false,
                total_operations: 0,
                error_count: 0,
                last_activity: None,
                registered_clients: Vec::new(),
                metadata: serde_json::Map::new(),
            }
        }
    }

    impl MarketDataReader for Bare {}
    impl MarketDataWriter for Bare {}

    #[tokio::test]
    async fn default_reader_ops_follow_the_lifecycle() {
        let reader = Bare::new(ActorRole::Reader);
        let out = reader.get_top_of_book("BTC-USD").await;
        assert_eq!(out.code(), Some(codes::READER_NOT_INITIALIZED));

        assert!(reader.initialize().await.is_success());
        assert_eq!(reader.get_market_analytics().await.code(), Some(codes::UNSUPPORTED_OPERATION));

        assert!(reader.cleanup().await.is_success());
        assert_eq!(reader.get_ohlcv("bitcoin", "usd", 1).await.code(), Some(codes::READER_NOT_INITIALIZED));
    }

    #[tokio::test]
    async fn default_writer_ops_follow_the_lifecycle() {
        let writer = Bare::new(ActorRole::Writer);
        let out = writer.publish_prices(&[]).await;
        assert_eq!(out.code(), Some(codes::WRITER_NOT_INITIALIZED));
        assert_eq!(out.error().unwrap().context["operation"], "publish_prices");

        assert!(writer.initialize().await.is_success());
        assert_eq!(writer.publish_candles(&[]).await.code(), Some(codes::UNSUPPORTED_OPERATION));
    }
}
