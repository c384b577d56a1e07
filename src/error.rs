use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Not enough rows to build a single input/forecast window pair
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Predict/save called before any train or load
    #[error("Model is not loaded")]
    ModelNotAvailable,

    /// Persisted model artifact missing on disk
    #[error("Model file not found at {0}")]
    ModelNotFound(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Invalid webhook signature: {0}")]
    Signature(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Io(format!("CSV error: {}", err))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(format!("invalid YAML: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Model(format!("artifact encoding: {}", err))
    }
}

impl AppError {
    /// HTTP status used when this error escapes a request handler
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidApiKey => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientData(_)
            | AppError::InvalidInput(_)
            | AppError::Signature(_)
            | AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::ModelNotAvailable | AppError::ModelNotFound(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            AppError::InvalidApiKey => "Invalid API Key".to_string(),
            AppError::Signature(_) => "Invalid webhook".to_string(),
            AppError::Payment(_) => "Payment processing failed.".to_string(),
            other => other.to_string(),
        };

        (status, axum::Json(json!({ "detail": detail }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_separate_data_and_model_failures() {
        assert_eq!(
            AppError::InsufficientData("0 windows".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("BTC/USD".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ModelNotAvailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::InvalidApiKey.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(matches!(err, AppError::Io(msg) if msg.contains("disk full")));
    }
}
