pub mod access;
pub mod api_logging;
pub mod collector;
pub mod exchanges;
pub mod logging;
pub mod payment;
pub mod pipeline;
pub mod processor;

pub use access::AccessGate;
pub use api_logging::{ApiLogger, ApiRequestMetrics, ApiStatus};
pub use collector::Collector;
pub use exchanges::{BinanceClient, CoinbaseClient, ExchangeAdapter, ExchangeClient};
pub use logging::init_logging;
pub use payment::{PaymentProvider, WebhookEvent};
pub use pipeline::{Pipeline, SharedPredictor, TrainReport};
pub use processor::{feature_engineering, preprocess};
