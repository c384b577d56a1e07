//! Exchange REST adapters
//!
//! Each exchange implements [`ExchangeClient`], which returns errors. The
//! [`ExchangeAdapter`] wrapper is what the collector talks to: it makes a
//! single attempt, logs any failure and reports it as a [`FetchOutcome`]
//! instead of propagating it.

mod binance;
mod coinbase;

pub use binance::BinanceClient;
pub use coinbase::CoinbaseClient;

use crate::error::{AppError, Result};
use crate::models::{CollectorConfig, FetchOutcome, RawSeries, Timeframe};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Per-exchange OHLCV source
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Identifier used in dataset keys ("binance", "coinbase")
    fn id(&self) -> &str;

    /// Fetch candles for a unified `BASE/QUOTE` symbol, oldest first
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> Result<RawSeries>;
}

/// Error-absorbing wrapper around an exchange client
#[derive(Clone)]
pub struct ExchangeAdapter {
    client: Arc<dyn ExchangeClient>,
    limit: u32,
}

impl ExchangeAdapter {
    pub fn new(client: Arc<dyn ExchangeClient>, limit: u32) -> Self {
        Self { client, limit }
    }

    pub fn id(&self) -> &str {
        self.client.id()
    }

    /// One attempt; failures are logged and returned as `FetchOutcome::Failed`
    pub async fn fetch_outcome(&self, symbol: &str, timeframe: Timeframe) -> FetchOutcome {
        match self.client.fetch_ohlcv(symbol, timeframe, self.limit).await {
            Ok(rows) => {
                info!(
                    exchange = self.id(),
                    symbol = symbol,
                    rows = rows.len(),
                    "Fetched OHLCV data"
                );
                FetchOutcome::Fetched(rows)
            }
            Err(e) => {
                error!(
                    exchange = self.id(),
                    symbol = symbol,
                    "Error fetching OHLCV data: {}",
                    e
                );
                FetchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Candles for the pair, or an empty series if anything went wrong
    pub async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> RawSeries {
        self.fetch_outcome(symbol, timeframe).await.into_series()
    }
}

/// Build a shared HTTP client with the configured timeout
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(concat!("pricecast/", env!("CARGO_PKG_VERSION")));
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder
        .build()
        .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Split a unified symbol into base and quote ("BTC/USD" -> ("BTC", "USD"))
pub(crate) fn split_symbol(symbol: &str) -> Result<(String, String)> {
    let mut parts = symbol.trim().split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
            Ok((base.to_uppercase(), quote.to_uppercase()))
        }
        _ => Err(AppError::InvalidInput(format!(
            "symbol must look like BASE/QUOTE, got '{}'",
            symbol
        ))),
    }
}

/// Read a JSON number that may be encoded as a string
pub(crate) fn json_f64(value: &serde_json::Value, field: &str) -> Result<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()))
        .ok_or_else(|| AppError::Parse(format!("Missing or invalid '{}' field: {}", field, value)))
}

/// Adapter for a configured exchange name, or `None` if unsupported
pub fn client_for(name: &str, config: &CollectorConfig) -> Result<Option<Arc<dyn ExchangeClient>>> {
    let client: Arc<dyn ExchangeClient> = match name.to_lowercase().as_str() {
        "binance" => Arc::new(BinanceClient::new(config.request_timeout_secs)?),
        "coinbase" | "coinbasepro" | "coinbaseexchange" => {
            Arc::new(CoinbaseClient::new(config.request_timeout_secs)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(client))
}
