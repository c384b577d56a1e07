mod config;
mod frame;
mod ohlcv;
mod timeframe;
pub mod indicators;

pub use config::{
    ApiKeysConfig, AppConfig, CollectorConfig, LogFileConfig, LoggingConfig, ModelConfig,
    MonetizationConfig, ServerConfig,
};
pub use frame::{Column, Frame};
pub use ohlcv::{pair_key, Candle, FetchOutcome, RawSeries};
pub use timeframe::Timeframe;

use std::collections::BTreeMap;

/// One collection cycle's raw candles, keyed by `pair_key`
pub type DataSet = BTreeMap<String, RawSeries>;

/// Frames keyed the same way as the `DataSet` they came from
pub type FrameSet = BTreeMap<String, Frame>;
