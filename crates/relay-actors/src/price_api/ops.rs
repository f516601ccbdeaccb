//! Price-API operations: one plugin/validate/transform set per DSL call.
//!
//! Raw payloads stay as `serde_json::Value` until the transform step; the
//! validators only check the fields the transform relies on.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use relay_core::types::*;
use relay_core::workflow::{BatchOperation, Operation};
use serde::Serialize;
use serde_json::Value;

use super::client::PriceApiClient;
use crate::json_util::{number, number_field, positive_f64_field, str_field, timestamp_ms, timestamp_rfc3339, timestamp_secs};

pub const SOURCE: &str = "coingecko";
pub const ATTRIBUTION: &str = "Data provided by CoinGecko";

/// The markets endpoint caps `per_page` at 250.
const MAX_PER_PAGE: usize = 250;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PriceArgs {
    pub coin_id: String,
    pub vs_currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricesArgs {
    pub coin_ids: Vec<String>,
    pub vs_currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OhlcvArgs {
    pub coin_id: String,
    pub vs_currency: String,
    pub days: u32,
}

// ---------------------------------------------------------------------------
// get_current_price: /coins/markets?ids=<id>
// ---------------------------------------------------------------------------

pub struct CurrentPrice;

#[async_trait]
impl Operation<PriceApiClient> for CurrentPrice {
    type Args = PriceArgs;
    type Raw = Value;
    type Output = PricePoint;

    fn name(&self) -> &'static str {
        "get_current_price"
    }

    fn validate_args(&self, args: &PriceArgs) -> Result<(), String> {
        ensure_plain_id(&args.coin_id)?;
        ensure_usd_quote(&args.vs_currency)
    }

    async fn plugin(&self, client: &PriceApiClient, args: &PriceArgs) -> Result<Value> {
        let body = client.get_json(&["coins", "markets"], &markets_query(std::slice::from_ref(&args.coin_id))).await?;
        // unknown ids come back as an empty array
        Ok(body.as_array().and_then(|a| a.first()).cloned().unwrap_or(Value::Null))
    }

    fn validate(&self, raw: &Value) -> bool {
        is_valid_market_entry(raw)
    }

    fn transform(&self, raw: Value, _args: &PriceArgs) -> Result<PricePoint> {
        transform_market_entry(&raw)
    }
}

// ---------------------------------------------------------------------------
// get_current_prices: /coins/markets?ids=<a,b,c>
// ---------------------------------------------------------------------------

pub struct CurrentPrices;

#[async_trait]
impl BatchOperation<PriceApiClient> for CurrentPrices {
    type Args = PricesArgs;
    type Item = Value;
    type Output = PricePoint;

    fn name(&self) -> &'static str {
        "get_current_prices"
    }

    fn validate_args(&self, args: &PricesArgs) -> Result<(), String> {
        if args.coin_ids.is_empty() {
            return Err("coin_ids must not be empty".into());
        }
        if args.coin_ids.len() > MAX_PER_PAGE {
            return Err(format!("at most {MAX_PER_PAGE} coin ids per call"));
        }
        ensure_usd_quote(&args.vs_currency)
    }

    async fn plugin(&self, client: &PriceApiClient, args: &PricesArgs) -> Result<Vec<Value>> {
        let body = client.get_json(&["coins", "markets"], &markets_query(&args.coin_ids)).await?;
        match body {
            Value::Array(items) => Ok(items),
            other => Err(anyhow!("expected an array from /coins/markets, got {}", type_name(&other))),
        }
    }

    fn validate_item(&self, item: &Value) -> bool {
        is_valid_market_entry(item)
    }

    fn transform_item(&self, item: Value, _args: &PricesArgs) -> Result<PricePoint> {
        transform_market_entry(&item)
    }
}

// ---------------------------------------------------------------------------
// get_ohlcv: /coins/{id}/ohlc?days=N
// ---------------------------------------------------------------------------

pub struct Ohlcv;

#[async_trait]
impl BatchOperation<PriceApiClient> for Ohlcv {
    type Args = OhlcvArgs;
    type Item = Value;
    type Output = OhlcvCandle;

    fn name(&self) -> &'static str {
        "get_ohlcv"
    }

    fn validate_args(&self, args: &OhlcvArgs) -> Result<(), String> {
        ensure_plain_id(&args.coin_id)?;
        if args.days == 0 {
            return Err("days must be > 0".into());
        }
        ensure_usd_quote(&args.vs_currency)
    }

    async fn plugin(&self, client: &PriceApiClient, args: &OhlcvArgs) -> Result<Vec<Value>> {
        let query = [("vs_currency", "usd".to_string()), ("days", args.days.to_string())];
        match client.get_json(&["coins", args.coin_id.as_str(), "ohlc"], &query).await? {
            Value::Array(rows) => Ok(rows),
            other => Err(anyhow!("expected an array from /coins/{}/ohlc, got {}", args.coin_id, type_name(&other))),
        }
    }

    /// `[timestamp_ms, open, high, low, close]` with a consistent range.
    fn validate_item(&self, item: &Value) -> bool {
        let Some(row) = item.as_array() else { return false };
        if row.len() < 5 || timestamp_ms(row.first()).is_none() {
            return false;
        }
        let ohlc: Option<Vec<f64>> = row[1..5].iter().map(|v| number(Some(v))).collect();
        match ohlc.as_deref() {
            Some(&[o, h, l, c]) => l > 0.0 && l <= h && (l..=h).contains(&o) && (l..=h).contains(&c),
            _ => false,
        }
    }

    fn transform_item(&self, item: Value, args: &OhlcvArgs) -> Result<OhlcvCandle> {
        let row = item.as_array().ok_or_else(|| anyhow!("candle row is not an array"))?;
        let num = |i: usize| number(row.get(i)).ok_or_else(|| anyhow!("candle field {i} is not a number"));
        Ok(OhlcvCandle {
            coin_id: args.coin_id.clone(),
            timestamp: timestamp_ms(row.first()).ok_or_else(|| anyhow!("candle timestamp missing"))?,
            open: num(1)?,
            high: num(2)?,
            low: num(3)?,
            close: num(4)?,
            // the OHLC endpoint carries no volume
            volume: 0.0,
            timeframe: timeframe_for_days(args.days),
            source: SOURCE.into(),
            attribution: ATTRIBUTION.into(),
        })
    }
}

/// Candle granularity the OHLC endpoint picks for a day range:
/// 1–2 days → 30m, 3–30 days → 4h, beyond → 4d.
pub fn timeframe_for_days(days: u32) -> Timeframe {
    match days {
        0..=2 => Timeframe::M30,
        3..=30 => Timeframe::H4,
        _ => Timeframe::D4,
    }
}

// ---------------------------------------------------------------------------
// get_market_analytics: /global
// ---------------------------------------------------------------------------

pub struct MarketAnalytics;

#[async_trait]
impl Operation<PriceApiClient> for MarketAnalytics {
    type Args = ();
    type Raw = Value;
    type Output = MarketAnalyticsSnapshot;

    fn name(&self) -> &'static str {
        "get_market_analytics"
    }

    async fn plugin(&self, client: &PriceApiClient, _args: &()) -> Result<Value> {
        let mut body = client.get_json(&["global"], &[]).await?;
        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    fn validate(&self, raw: &Value) -> bool {
        raw.get("total_market_cap").and_then(|m| positive_f64_field(m, "usd")).is_some()
            && raw.get("market_cap_percentage").and_then(|m| number_field(m, "btc")).is_some()
    }

    fn transform(&self, raw: Value, _args: &()) -> Result<MarketAnalyticsSnapshot> {
        let usd = |field: &str| raw.get(field).and_then(|m| number_field(m, "usd"));
        let dominance = |coin: &str| raw.get("market_cap_percentage").and_then(|m| number_field(m, coin));

        Ok(MarketAnalyticsSnapshot {
            timestamp: timestamp_secs(raw.get("updated_at")).unwrap_or_else(Utc::now),
            total_market_cap: usd("total_market_cap").ok_or_else(|| anyhow!("total_market_cap.usd missing"))?,
            total_volume: usd("total_volume").unwrap_or(0.0),
            btc_dominance: dominance("btc").ok_or_else(|| anyhow!("market_cap_percentage.btc missing"))?,
            eth_dominance: dominance("eth"),
            active_cryptocurrencies: raw.get("active_cryptocurrencies").and_then(Value::as_u64).unwrap_or(0),
            markets: raw.get("markets").and_then(Value::as_u64).unwrap_or(0),
            market_cap_change_24h: number_field(&raw, "market_cap_change_percentage_24h_usd").unwrap_or(0.0),
            source: SOURCE.into(),
            attribution: ATTRIBUTION.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Coin ids are single path segments on the API.
fn ensure_plain_id(coin_id: &str) -> Result<(), String> {
    if coin_id.trim().is_empty() {
        return Err("coin_id must not be empty".into());
    }
    if coin_id.contains(['/', '?', '#', '%']) || coin_id == "." || coin_id == ".." {
        return Err(format!("coin_id '{coin_id}' is not a plain id"));
    }
    Ok(())
}

fn markets_query(ids: &[String]) -> Vec<(&'static str, String)> {
    vec![
        ("vs_currency", "usd".to_string()),
        ("ids", ids.join(",")),
        ("order", "market_cap_desc".to_string()),
        ("per_page", ids.len().clamp(1, MAX_PER_PAGE).to_string()),
        ("page", "1".to_string()),
        ("sparkline", "false".to_string()),
        ("price_change_percentage", "24h".to_string()),
    ]
}

/// Entries with a `null` price (delisted / stale coins) are rejected.
fn is_valid_market_entry(v: &Value) -> bool {
    v.is_object()
        && str_field(v, "id").is_some_and(|id| !id.is_empty())
        && str_field(v, "symbol").is_some()
        && positive_f64_field(v, "current_price").is_some()
}

/// One `/coins/markets` entry → [`PricePoint`].
pub fn transform_market_entry(v: &Value) -> Result<PricePoint> {
    let id = str_field(v, "id").ok_or_else(|| anyhow!("market entry without id"))?;
    Ok(PricePoint {
        coin_id: id.to_string(),
        symbol: str_field(v, "symbol").unwrap_or_default().to_uppercase(),
        name: str_field(v, "name").unwrap_or(id).to_string(),
        usd_price: positive_f64_field(v, "current_price").ok_or_else(|| anyhow!("{id}: current_price missing"))?,
        btc_price: None,
        market_cap: number_field(v, "market_cap"),
        volume_24h: number_field(v, "total_volume"),
        change_24h: number_field(v, "price_change_percentage_24h"),
        last_updated: timestamp_rfc3339(v.get("last_updated")).unwrap_or_else(Utc::now),
        source: SOURCE.into(),
        attribution: ATTRIBUTION.into(),
    })
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn btc_entry() -> Value {
        json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 50000.0,
            "market_cap": 980000000000.0,
            "total_volume": 21000000000.0,
            "price_change_percentage_24h": -1.25,
            "last_updated": "2024-03-01T12:00:00.000Z"
        })
    }

    #[test]
    fn market_entry_to_price_point() {
        let p = transform_market_entry(&btc_entry()).unwrap();
        assert_eq!(p.coin_id, "bitcoin");
        assert_eq!(p.symbol, "BTC");
        assert_eq!(p.usd_price, 50000.0);
        assert_eq!(p.change_24h, Some(-1.25));
        assert_eq!(p.last_updated.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert_eq!(p.source, SOURCE);
        assert_eq!(p.attribution, ATTRIBUTION);
    }

    #[test]
    fn null_price_is_invalid() {
        let mut e = btc_entry();
        e["current_price"] = Value::Null;
        assert!(!is_valid_market_entry(&e));
        assert!(!is_valid_market_entry(&Value::Null));
        assert!(is_valid_market_entry(&btc_entry()));
    }

    #[test]
    fn missing_optionals_are_fine() {
        let p = transform_market_entry(&json!({"id": "x", "symbol": "x", "current_price": 1})).unwrap();
        assert_eq!(p.name, "x");
        assert!(p.market_cap.is_none());
        assert!(p.volume_24h.is_none());
    }

    #[test]
    fn ohlc_row_validation() {
        let op = Ohlcv;
        assert!(op.validate_item(&json!([1709251200000u64, 100.0, 110.0, 95.0, 105.0])));
        assert!(!op.validate_item(&json!([1709251200000u64, 100.0, 90.0, 95.0, 105.0])));
        assert!(!op.validate_item(&json!([1709251200000u64, 100.0, 110.0])));
        assert!(!op.validate_item(&json!({"t": 1})));
    }

    #[test]
    fn ohlc_row_transform() {
        let args = OhlcvArgs { coin_id: "bitcoin".into(), vs_currency: "usd".into(), days: 7 };
        let c = Ohlcv.transform_item(json!([1709251200000u64, 100.0, 110.0, 95.0, 105.0]), &args).unwrap();
        assert_eq!(c.timeframe, Timeframe::H4);
        assert_eq!(c.close, 105.0);
        assert_eq!(c.timestamp.timestamp_millis(), 1709251200000);
        assert!(c.is_consistent());
    }

    #[test]
    fn day_ranges() {
        assert_eq!(timeframe_for_days(1), Timeframe::M30);
        assert_eq!(timeframe_for_days(30), Timeframe::H4);
        assert_eq!(timeframe_for_days(90), Timeframe::D4);
    }

    #[test]
    fn global_payload() {
        let raw = json!({
            "active_cryptocurrencies": 13000,
            "markets": 1000,
            "total_market_cap": {"usd": 2.5e12},
            "total_volume": {"usd": 9.0e10},
            "market_cap_percentage": {"btc": 52.1, "eth": 16.4},
            "market_cap_change_percentage_24h_usd": 1.5,
            "updated_at": 1709251200
        });
        assert!(MarketAnalytics.validate(&raw));
        let s = MarketAnalytics.transform(raw, &()).unwrap();
        assert_eq!(s.btc_dominance, 52.1);
        assert_eq!(s.eth_dominance, Some(16.4));
        assert_eq!(s.active_cryptocurrencies, 13000);
        assert!(s.is_valid());
    }

    #[test]
    fn coin_ids_must_be_plain_segments() {
        let args = |id: &str| OhlcvArgs { coin_id: id.into(), vs_currency: "usd".into(), days: 1 };
        assert!(Ohlcv.validate_args(&args("bitcoin")).is_ok());
        assert!(Ohlcv.validate_args(&args("wrapped-bitcoin")).is_ok());
        for bad in ["../global", "btc?x=1", "btc#frag", "..", "%2F"] {
            assert!(Ohlcv.validate_args(&args(bad)).is_err(), "{bad}");
        }
        let price = PriceArgs { coin_id: "a/b".into(), vs_currency: "usd".into() };
        assert!(CurrentPrice.validate_args(&price).is_err());
    }

    #[test]
    fn rejects_non_usd_quotes() {
        let args = PriceArgs { coin_id: "bitcoin".into(), vs_currency: "eur".into() };
        assert!(CurrentPrice.validate_args(&args).is_err());
        let args = PricesArgs { coin_ids: vec![], vs_currency: "usd".into() };
        assert!(CurrentPrices.validate_args(&args).is_err());
    }
}
