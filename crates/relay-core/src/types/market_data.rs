//! Canonical market-data values: what every actor ultimately produces or
//! consumes, whatever its backend speaks natively.
//!
//! Every value carries `source` (which backend produced it) and
//! `attribution` (the provenance string that must travel with the data).
//! Values are created fresh per operation and never mutated afterwards.
//!
//! # Wire format
//!
//! All types serialize to camelCase JSON; this is the payload published on
//! broker topics and stored as store rows.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Timeframe;

// ---------------------------------------------------------------------------
// Spot price
// ---------------------------------------------------------------------------

/// A spot price observation for one coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
    pub usd_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btc_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<f64>,
    pub last_updated: DateTime<Utc>,
    pub source: String,
    pub attribution: String,
}

impl PricePoint {
    /// Finite, strictly positive price.
    pub fn is_valid(&self) -> bool {
        self.usd_price.is_finite() && self.usd_price > 0.0 && !self.coin_id.is_empty()
    }
}

/// Canonical prices are USD-denominated; readers refuse any other quote.
pub fn ensure_usd_quote(vs_currency: &str) -> Result<(), String> {
    if vs_currency.eq_ignore_ascii_case("usd") {
        Ok(())
    } else {
        Err(format!("unsupported quote currency '{vs_currency}', only usd is served"))
    }
}

// ---------------------------------------------------------------------------
// OHLCV
// ---------------------------------------------------------------------------

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OhlcvCandle {
    pub coin_id: String,
    /// Candle open time.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timeframe: Timeframe,
    pub source: String,
    pub attribution: String,
}

impl OhlcvCandle {
    /// `low <= open,close <= high` and nothing negative.
    pub fn is_consistent(&self) -> bool {
        self.low >= 0.0
            && self.volume >= 0.0
            && self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }
}

/// Start of a `days`-long window ending at `now`. Saturates at the earliest
/// representable instant instead of overflowing.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ---------------------------------------------------------------------------
// Global market analytics
// ---------------------------------------------------------------------------

/// Whole-market snapshot (total cap, dominance, breadth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalyticsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_market_cap: f64,
    pub total_volume: f64,
    /// Percentage of total market cap, 0–100.
    pub btc_dominance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_dominance: Option<f64>,
    pub active_cryptocurrencies: u64,
    pub markets: u64,
    pub market_cap_change_24h: f64,
    pub source: String,
    pub attribution: String,
}

impl MarketAnalyticsSnapshot {
    /// Positive market cap and dominance within 0–100.
    pub fn is_valid(&self) -> bool {
        self.total_market_cap.is_finite()
            && self.total_market_cap > 0.0
            && (0.0..=100.0).contains(&self.btc_dominance)
            && self.eth_dominance.is_none_or(|d| (0.0..=100.0).contains(&d))
    }
}

// ---------------------------------------------------------------------------
// Top of book
// ---------------------------------------------------------------------------

/// Best bid / best ask for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopOfBook {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread: f64,
    pub spread_percent: f64,
    pub market: String,
    pub source: String,
    pub attribution: String,
}

impl TopOfBook {
    /// Build a quote, deriving `spread` and `spread_percent` (relative to mid).
    pub fn new(
        ticker: impl Into<String>,
        timestamp: DateTime<Utc>,
        best_bid: f64,
        best_ask: f64,
        market: impl Into<String>,
        source: impl Into<String>,
        attribution: impl Into<String>,
    ) -> Self {
        let spread = best_ask - best_bid;
        let mid = (best_ask + best_bid) / 2.0;
        let spread_percent = if mid > 0.0 { spread / mid * 100.0 } else { 0.0 };
        Self {
            ticker: ticker.into(),
            timestamp,
            best_bid,
            best_ask,
            spread,
            spread_percent,
            market: market.into(),
            source: source.into(),
            attribution: attribution.into(),
        }
    }

    /// Bid below ask and both positive.
    pub fn is_uncrossed(&self) -> bool {
        self.best_bid > 0.0 && self.best_ask > 0.0 && self.best_bid <= self.best_ask
    }
}

// ---------------------------------------------------------------------------
// Write receipt
// ---------------------------------------------------------------------------

/// What a sink reports after a successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    /// Topic or table written to.
    pub destination: String,
    /// Number of records accepted by the backend.
    pub records: u64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Display impls
// ---------------------------------------------------------------------------

impl std::fmt::Display for PricePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Price({} {} usd={:.8} src={})", self.coin_id, self.symbol, self.usd_price, self.source)
    }
}

impl std::fmt::Display for OhlcvCandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Candle({} {} o={:.8} h={:.8} l={:.8} c={:.8} v={:.4})",
            self.coin_id, self.timeframe, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

impl std::fmt::Display for TopOfBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TopOfBook({} bid={:.8} ask={:.8} spread={:.4}%)",
            self.ticker, self.best_bid, self.best_ask, self.spread_percent
        )
    }
}
