use crate::constants::*;
use crate::error::{AppError, Result};
use crate::models::Timeframe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Whole application configuration, read from a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub collector: CollectorConfig,
    pub model: ModelConfig,
    pub api_keys: ApiKeysConfig,
    pub monetization: MonetizationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

/// Which pairs get fetched each collection cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Exchange identifiers; the first one is used for predictions
    pub exchanges: Vec<String>,

    /// Unified `BASE/QUOTE` symbols
    pub symbols: Vec<String>,

    pub timeframe: Timeframe,

    /// Candles requested per fetch
    pub limit: u32,

    pub request_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            exchanges: DEFAULT_EXCHANGES.iter().map(|s| s.to_string()).collect(),
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            timeframe: Timeframe::default(),
            limit: DEFAULT_CANDLE_LIMIT,
            request_timeout_secs: 30,
        }
    }
}

impl CollectorConfig {
    /// Exchange whose frames feed predictions
    pub fn primary_exchange(&self) -> &str {
        self.exchanges
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_EXCHANGES[0])
    }
}

/// Windowing, architecture and training parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_steps: usize,
    pub forecast_steps: usize,
    pub max_depth: usize,
    pub hidden_units: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_steps: DEFAULT_INPUT_STEPS,
            forecast_steps: DEFAULT_FORECAST_STEPS,
            max_depth: DEFAULT_MAX_DEPTH,
            hidden_units: LSTM_HIDDEN_UNITS,
            learning_rate: DEFAULT_LEARNING_RATE,
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeysConfig {
    pub allowed_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonetizationConfig {
    pub payment_provider: String,
    pub stripe_api_key: String,
    pub stripe_webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
}

impl Default for MonetizationConfig {
    fn default() -> Self {
        Self {
            payment_provider: "stripe".to_string(),
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            success_url: "http://localhost:8000/payment/success".to_string(),
            cancel_url: "http://localhost:8000/payment/cancel".to_string(),
            currency: "usd".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,

    /// Any of "console" and "file"
    pub handlers: Vec<String>,

    pub file: Option<LogFileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            handlers: vec!["console".to_string()],
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    pub filename: PathBuf,

    /// Rotate once the file reaches this many bytes
    pub max_size: u64,

    /// Rotated files kept as `<filename>.1 ... <filename>.N`
    pub backup_count: usize,
}

impl LoggingConfig {
    pub fn console_enabled(&self) -> bool {
        self.handlers.iter().any(|h| h.eq_ignore_ascii_case("console"))
    }

    /// File settings, only when the "file" handler is switched on
    pub fn file_target(&self) -> Option<&LogFileConfig> {
        if self.handlers.iter().any(|h| h.eq_ignore_ascii_case("file")) {
            self.file.as_ref()
        } else {
            None
        }
    }

    /// Directory holding the application log (and the API request log)
    pub fn log_dir(&self) -> PathBuf {
        self.file
            .as_ref()
            .and_then(|f| f.filename.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("logs"))
    }
}

impl AppConfig {
    /// Load from a YAML file; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
            Self::from_yaml(&contents)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        info!(
            path = %path.display(),
            exchanges = ?config.collector.exchanges,
            symbols = ?config.collector.symbols,
            allowed_keys = config.api_keys.allowed_keys.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Secrets may come from the environment instead of the file
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("STRIPE_API_KEY") {
            if !key.trim().is_empty() {
                self.monetization.stripe_api_key = key.trim().to_string();
            }
        }
        if let Ok(secret) = std::env::var("STRIPE_WEBHOOK_SECRET") {
            if !secret.trim().is_empty() {
                self.monetization.stripe_webhook_secret = secret.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        if model.input_steps == 0 || model.forecast_steps == 0 {
            return Err(AppError::Config(
                "model.input_steps and model.forecast_steps must be positive".to_string(),
            ));
        }
        if model.hidden_units == 0 || model.batch_size == 0 {
            return Err(AppError::Config(
                "model.hidden_units and model.batch_size must be positive".to_string(),
            ));
        }
        if self.collector.exchanges.is_empty() || self.collector.symbols.is_empty() {
            return Err(AppError::Config(
                "collector.exchanges and collector.symbols must not be empty".to_string(),
            ));
        }
        if let Some(file) = self.logging.file_target() {
            if file.max_size == 0 {
                return Err(AppError::Config("logging.file.max_size must be positive".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.collector.exchanges, vec!["binance", "coinbase"]);
        assert_eq!(config.collector.primary_exchange(), "binance");
        assert_eq!(config.model.hidden_units, 50);
        assert_eq!(config.model.max_depth, 3);
        assert!(config.api_keys.allowed_keys.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = r#"
model:
  input_steps: 30
  forecast_steps: 5
api_keys:
  allowed_keys: ["abc", "def"]
logging:
  level: debug
  handlers: [console, file]
  file:
    filename: logs/app.log
    max_size: 1024
    backup_count: 2
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.model.input_steps, 30);
        assert_eq!(config.model.forecast_steps, 5);
        assert_eq!(config.model.epochs, DEFAULT_EPOCHS);
        assert_eq!(config.api_keys.allowed_keys, vec!["abc", "def"]);
        assert_eq!(config.collector.timeframe, Timeframe::Hour1);
        assert_eq!(config.logging.file_target().unwrap().backup_count, 2);
        assert_eq!(config.logging.log_dir(), PathBuf::from("logs"));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = AppConfig::from_yaml("model: [not, a, map]").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_steps() {
        let mut config = AppConfig::default();
        config.model.input_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_file_handler_requires_flag() {
        let mut logging = LoggingConfig::default();
        logging.file = Some(LogFileConfig {
            filename: PathBuf::from("x.log"),
            max_size: 10,
            backup_count: 1,
        });
        assert!(logging.file_target().is_none());
        logging.handlers.push("file".to_string());
        assert!(logging.file_target().is_some());
    }
}
