use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV row: `(timestamp_ms, open, high, low, close, volume)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time in Unix milliseconds
    pub timestamp_ms: i64,

    /// Opening price
    pub open: f64,

    /// Highest price
    pub high: f64,

    /// Lowest price
    pub low: f64,

    /// Closing price
    pub close: f64,

    /// Traded base volume
    pub volume: f64,
}

impl Candle {
    /// Create a new candle
    pub fn new(timestamp_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Build from the fixed-width numeric row exchanges return
    pub fn from_row(row: [f64; 6]) -> Self {
        Self::new(row[0] as i64, row[1], row[2], row[3], row[4], row[5])
    }

    /// Open time as a UTC datetime
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }
}

/// Ordered candles for one `(exchange, symbol)` pair; empty means the fetch failed
pub type RawSeries = Vec<Candle>;

/// What a single exchange fetch produced
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Candles came back (possibly zero of them)
    Fetched(RawSeries),
    /// No adapter exists for the configured exchange name
    NotSupported,
    /// Transport, API or decoding failure
    Failed(String),
}

impl FetchOutcome {
    /// Collapse into the plain series; anything but `Fetched` becomes empty
    pub fn into_series(self) -> RawSeries {
        match self {
            FetchOutcome::Fetched(rows) => rows,
            FetchOutcome::NotSupported | FetchOutcome::Failed(_) => Vec::new(),
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_))
    }
}

/// Key under which a pair's data is stored: `"{exchange}_{BASE}_{QUOTE}"`
pub fn pair_key(exchange: &str, symbol: &str) -> String {
    format!("{}_{}", exchange, symbol.replace('/', "_"))
}
