use super::{http_client, json_f64, split_symbol, ExchangeClient};
use crate::error::{AppError, Result};
use crate::models::{Candle, RawSeries, Timeframe};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Base URL for the Coinbase Exchange (formerly Coinbase Pro) REST API
const BASE_URL: &str = "https://api.exchange.coinbase.com";

/// Coinbase returns at most 300 candles per request
const MAX_CANDLES: usize = 300;

/// Coinbase Exchange product candles client
pub struct CoinbaseClient {
    base_url: String,
    client: reqwest::Client,
}

impl CoinbaseClient {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: BASE_URL.to_string(),
            client: http_client(timeout_secs)?,
        })
    }

    /// "BTC/USD" -> "BTC-USD"
    fn product_id(symbol: &str) -> Result<String> {
        let (base, quote) = split_symbol(symbol)?;
        Ok(format!("{}-{}", base, quote))
    }
}

/// Parse `/products/{id}/candles` rows: `[time_s, low, high, open, close, volume]`, newest first
pub(crate) fn parse_candles(json: &Value) -> Result<RawSeries> {
    let rows = json
        .as_array()
        .ok_or_else(|| AppError::Parse(format!("Expected candle array, got: {}", json)))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row
            .as_array()
            .filter(|f| f.len() >= 6)
            .ok_or_else(|| AppError::Parse(format!("Malformed candle row: {}", row)))?;

        let time_s = fields[0]
            .as_i64()
            .ok_or_else(|| AppError::Parse(format!("Invalid candle time: {}", fields[0])))?;

        candles.push(Candle::new(
            time_s * 1000,
            json_f64(&fields[3], "open")?,
            json_f64(&fields[2], "high")?,
            json_f64(&fields[1], "low")?,
            json_f64(&fields[4], "close")?,
            json_f64(&fields[5], "volume")?,
        ));
    }

    candles.sort_by_key(|c| c.timestamp_ms);
    Ok(candles)
}

#[async_trait]
impl ExchangeClient for CoinbaseClient {
    fn id(&self) -> &str {
        "coinbase"
    }

    async fn fetch_ohlcv(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> Result<RawSeries> {
        let url = format!(
            "{}/products/{}/candles?granularity={}",
            self.base_url,
            Self::product_id(symbol)?,
            timeframe.as_seconds()
        );

        debug!("Requesting Coinbase candles: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Coinbase request failed: {} (url: {})", e, url)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Network(format!("Coinbase error {}: {}", status, body)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse Coinbase response: {}", e)))?;

        let mut candles = parse_candles(&json)?;

        // keep the most recent `limit` rows
        let keep = (limit as usize).clamp(1, MAX_CANDLES);
        if candles.len() > keep {
            candles.drain(..candles.len() - keep);
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_id() {
        assert_eq!(CoinbaseClient::product_id("BTC/USD").unwrap(), "BTC-USD");
    }

    #[test]
    fn test_parse_candles_reorders_fields_and_rows() {
        let body = json!([
            [1609459260, 29300.0, 29600.0, 29400.0, 29500.0, 600.0],
            [1609459200, 28900.0, 29500.0, 29000.0, 29400.0, 500.0]
        ]);

        let candles = parse_candles(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(
            candles[0],
            Candle::new(1609459200000, 29000.0, 29500.0, 28900.0, 29400.0, 500.0)
        );
        assert_eq!(candles[1].timestamp_ms, 1609459260000);
    }

    #[test]
    fn test_parse_candles_error_message() {
        let body = json!({"message": "NotFound"});
        assert!(parse_candles(&body).is_err());
    }
}
