//! HTTP handle for the public price API.
//!
//! # REST endpoints
//!
//! | Operation          | Method | Path                    |
//! |--------------------|--------|-------------------------|
//! | Liveness           | GET    | `/ping`                 |
//! | Market prices      | GET    | `/coins/markets`        |
//! | OHLC candles       | GET    | `/coins/{id}/ohlc`      |
//! | Global analytics   | GET    | `/global`               |
//!
//! Connect failures are raised as [`RelayError::Network`], request timeouts
//! as [`RelayError::Timeout`] and non-2xx responses as [`RelayError::Http`].
//! Path segments are percent-encoded, so caller ids never change the route.

use std::time::Duration;

use anyhow::{Context, Result};
use relay_core::RelayError;
use relay_core::config::PriceApiConfig;
use tracing::debug;
use url::Url;

/// Header carrying the optional API key.
const API_KEY_HEADER: &str = "x-cg-pro-api-key";

const DEFAULT_USER_AGENT: &str = concat!("market-relay/", env!("CARGO_PKG_VERSION"));

/// Connection handle registered by [`PriceApiReader`](super::PriceApiReader).
pub struct PriceApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl PriceApiClient {
    /// Build the client. The request timeout from the config is enforced
    /// here, inside the plugin's transport.
    pub fn new(config: &PriceApiConfig) -> Result<Self> {
        // a trailing slash makes Url::join append instead of replacing the last segment
        let base = if config.base_url.ends_with('/') { config.base_url.clone() } else { format!("{}/", config.base_url) };
        let base_url =
            Url::parse(&base).map_err(|e| RelayError::Config(format!("invalid base_url '{}': {e}", config.base_url)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, base_url, api_key: config.api_key.clone() })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// GET the path made of `segments` with query parameters and decode the
    /// JSON body.
    pub async fn get_json(&self, segments: &[&str], query: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = self.endpoint(segments)?;
        let path = segments.join("/");
        debug!("[price-api] GET {url} {query:?}");

        let mut req = self.http.get(url).query(query);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await.map_err(|e| transport_error(&e)).with_context(|| format!("GET {path}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Http { status: status.as_u16(), body }).with_context(|| format!("GET {path}"));
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| RelayError::Parse(e.to_string()))
            .with_context(|| format!("GET {path}: invalid JSON body"))
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RelayError::Config(format!("base_url '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Liveness check used by `initialize()`.
    pub async fn ping(&self) -> Result<()> {
        self.get_json(&["ping"], &[]).await.map(|_| ())
    }
}

fn transport_error(e: &reqwest::Error) -> RelayError {
    if e.is_timeout() {
        RelayError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        RelayError::Network(e.to_string())
    } else {
        RelayError::Http { status: e.status().map_or(0, |s| s.as_u16()), body: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_path_prefix() {
        let client = PriceApiClient::new(&PriceApiConfig::new("cg", "https://api.example.com/api/v3")).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/api/v3/");
        let joined = client.endpoint(&["coins", "markets"]).unwrap();
        assert_eq!(joined.as_str(), "https://api.example.com/api/v3/coins/markets");
    }

    #[test]
    fn segments_are_escaped() {
        let client = PriceApiClient::new(&PriceApiConfig::new("cg", "https://api.example.com/api/v3")).unwrap();
        let url = client.endpoint(&["coins", "../global", "ohlc"]).unwrap();
        assert_eq!(url.path(), "/api/v3/coins/..%2Fglobal/ohlc");
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = PriceApiClient::new(&PriceApiConfig::new("cg", "not a url")).err().unwrap();
        assert!(matches!(err.downcast_ref::<RelayError>(), Some(RelayError::Config(_))));
    }
}
