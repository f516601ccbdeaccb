//! Public price API reader (CoinGecko-compatible REST).
//!
//! Serves spot prices, OHLC candles and global market analytics. Top of book
//! is not available from this backend and returns `UNSUPPORTED_OPERATION`.

pub mod client;
pub mod ops;

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::config::PriceApiConfig;
use relay_core::error::{DomainError, categorize, codes};
use relay_core::registry::ClientConfig;
use relay_core::workflow::Workflow;
use relay_core::*;
use tracing::{info, warn};

use self::client::PriceApiClient;
use self::ops::{CurrentPrice, CurrentPrices, MarketAnalytics, Ohlcv, OhlcvArgs, PriceArgs, PricesArgs};

/// Source actor backed by the public price API.
pub struct PriceApiReader {
    config: PriceApiConfig,
    workflow: Workflow<PriceApiClient>,
}

impl PriceApiReader {
    pub fn new(config: PriceApiConfig) -> Self {
        let workflow = Workflow::new(format!("price-api:{}", config.key), ActorRole::Reader);
        Self { config, workflow }
    }
}

#[async_trait]
impl Actor for PriceApiReader {
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
        if self.workflow.is_initialized() {
            return Outcome::Success(());
        }
        let client = match PriceApiClient::new(&self.config) {
            Ok(c) => c,
            Err(e) => {
                return Outcome::Failure(
                    DomainError::new(codes::INITIALIZATION_FAILED, format!("{e:#}"), ErrorCategory::Business)
                        .with_context("actor", self.name()),
                );
            }
        };

        if let Err(e) = client.ping().await {
            warn!("[{}] ping failed: {e:#}", self.name());
            return Outcome::Failure(
                DomainError::new(codes::INITIALIZATION_FAILED, format!("price API unreachable: {e:#}"), categorize(&e))
                    .with_context("actor", self.name())
                    .with_context("base_url", &self.config.base_url),
            );
        }

        self.workflow.add_connected_client(
            self.config.key.clone(),
            Arc::new(client),
            ClientConfig::new("CoinGecko", ClientType::DataSource),
        );
        self.workflow.mark_initialized();
        info!("[{}] initialized ({})", self.name(), self.config.base_url);
        Outcome::Success(())
    }

    async fn cleanup(&self) -> Outcome<()> {
        // HTTP connections close when the last handle is dropped
        let released = self.workflow.teardown();
        info!("[{}] cleaned up ({} client(s) released)", self.name(), released.len());
        Outcome::Success(())
    }

    fn status(&self) -> ActorStatus {
        self.workflow
            .status()
            .with_metadata("baseUrl", &self.config.base_url)
            .with_metadata("timeoutMs", self.config.timeout_ms)
            .with_metadata("authenticated", self.config.api_key.is_some())
    }
}

#[async_trait]
impl MarketDataReader for PriceApiReader {
    async fn get_current_price(&self, coin_id: &str, vs_currency: &str) -> Outcome<PricePoint> {
        let args = PriceArgs { coin_id: coin_id.to_string(), vs_currency: vs_currency.to_string() };
        self.workflow.execute(&CurrentPrice, args, None).await
    }

    async fn get_current_prices(&self, coin_ids: &[String], vs_currency: &str) -> Outcome<Vec<PricePoint>> {
        let args = PricesArgs { coin_ids: coin_ids.to_vec(), vs_currency: vs_currency.to_string() };
        self.workflow.execute_batch(&CurrentPrices, args, None).await
    }

    async fn get_ohlcv(&self, coin_id: &str, vs_currency: &str, days: u32) -> Outcome<Vec<OhlcvCandle>> {
        let args = OhlcvArgs { coin_id: coin_id.to_string(), vs_currency: vs_currency.to_string(), days };
        self.workflow.execute_batch(&Ohlcv, args, None).await
    }

    async fn get_market_analytics(&self) -> Outcome<MarketAnalyticsSnapshot> {
        self.workflow.execute(&MarketAnalytics, (), None).await
    }
}
