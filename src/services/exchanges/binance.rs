use super::{http_client, json_f64, split_symbol, ExchangeClient};
use crate::error::{AppError, Result};
use crate::models::{Candle, RawSeries, Timeframe};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Base URL for the Binance spot REST API
const BASE_URL: &str = "https://api.binance.com";

/// Binance caps `limit` at 1000 klines per request
const MAX_LIMIT: u32 = 1000;

/// Quote asset used in place of USD
const USD_QUOTE_ALIAS: &str = "USDT";

/// Binance spot klines client
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout_secs)
    }

    /// Point at another Binance-compatible host (e.g. api.binance.us)
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            client: http_client(timeout_secs)?,
        })
    }

    /// "BTC/USDT" -> "BTCUSDT"; spot lists no USD books, so "BTC/USD" -> "BTCUSDT"
    fn market_id(symbol: &str) -> Result<String> {
        let (base, quote) = split_symbol(symbol)?;
        let quote = if quote == "USD" { USD_QUOTE_ALIAS } else { quote.as_str() };
        Ok(format!("{}{}", base, quote))
    }
}

/// Parse `/api/v3/klines` rows: `[open_time, "open", "high", "low", "close", "volume", ...]`
pub(crate) fn parse_klines(json: &Value) -> Result<RawSeries> {
    let rows = json
        .as_array()
        .ok_or_else(|| AppError::Parse(format!("Expected kline array, got: {}", json)))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row
            .as_array()
            .filter(|f| f.len() >= 6)
            .ok_or_else(|| AppError::Parse(format!("Malformed kline row: {}", row)))?;

        let timestamp_ms = fields[0]
            .as_i64()
            .ok_or_else(|| AppError::Parse(format!("Invalid open time: {}", fields[0])))?;

        candles.push(Candle::new(
            timestamp_ms,
            json_f64(&fields[1], "open")?,
            json_f64(&fields[2], "high")?,
            json_f64(&fields[3], "low")?,
            json_f64(&fields[4], "close")?,
            json_f64(&fields[5], "volume")?,
        ));
    }

    candles.sort_by_key(|c| c.timestamp_ms);
    Ok(candles)
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn id(&self) -> &str {
        "binance"
    }

    async fn fetch_ohlcv(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> Result<RawSeries> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            Self::market_id(symbol)?,
            timeframe.to_interval_string(),
            limit.clamp(1, MAX_LIMIT)
        );

        debug!("Requesting Binance klines: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Binance request failed: {} (url: {})", e, url)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(AppError::Network(format!(
                "Binance returned error status {}: {}",
                status, body
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse Binance response: {}", e)))?;

        parse_klines(&json)
    }
}
