//! Pipeline Constants
//!
//! Column layout, feature windows and model defaults shared by the
//! processor, predictor and front ends.
//!
//! ## Frame Layout
//!
//! Preprocessing produces the 5 base columns below, indexed by the candle's
//! millisecond timestamp. Feature engineering appends `ma_<depth>` and
//! `ema_<depth>` for every depth, so a finished frame has
//! `BASE_COLUMN_COUNT + 2 * max_depth` columns.

/// Columns left after `timestamp` becomes the index
pub const BASE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Number of base columns in a preprocessed frame
pub const BASE_COLUMN_COUNT: usize = 5;

/// Rolling window of the depth-0 moving averages
pub const FEATURE_BASE_WINDOW: usize = 10;

/// Window growth per additional depth (depth d uses `10 + 5 * d`)
pub const FEATURE_WINDOW_STEP: usize = 5;

/// Number of MA/EMA depths computed by default (windows 10, 15, 20)
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Window size for a feature depth
pub const fn feature_window(depth: usize) -> usize {
    FEATURE_BASE_WINDOW + FEATURE_WINDOW_STEP * depth
}

/// Exchanges queried when the config does not name any
pub const DEFAULT_EXCHANGES: &[&str] = &["binance", "coinbase"];

/// Symbols collected when the config does not name any
pub const DEFAULT_SYMBOLS: &[&str] = &["BTC/USD", "ETH/USD"];

/// Candles requested per fetch (Binance caps at 1000, Coinbase at 300)
pub const DEFAULT_CANDLE_LIMIT: u32 = 300;

/// Units in each of the two stacked LSTM layers
pub const LSTM_HIDDEN_UNITS: usize = 50;

/// Adam step size
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// Past closes fed into one forecast
pub const DEFAULT_INPUT_STEPS: usize = 60;

/// Future closes produced by one forecast
pub const DEFAULT_FORECAST_STEPS: usize = 3;

pub const DEFAULT_EPOCHS: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Where the model artifact lives unless configured otherwise
pub const DEFAULT_MODEL_PATH: &str = "models/model.bin";

/// Config file read when neither `--config` nor `PRICECAST_CONFIG` is set
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Stripe event that issues a new access key
pub const CHECKOUT_COMPLETED_EVENT: &str = "checkout.session.completed";

/// Maximum age of a signed webhook before it is rejected
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Rotated API request log (written next to the application log)
pub const API_LOG_FILENAME: &str = "api_requests.log";

/// Rotation threshold for the API request log
pub const API_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const API_LOG_BACKUPS: usize = 3;
