use crate::constants::{API_LOG_BACKUPS, API_LOG_FILENAME, API_LOG_MAX_BYTES};
use crate::utils::write_with_rotation;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Timing and outcome of one `/predict` request
#[derive(Debug, Clone)]
pub struct ApiRequestMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: ApiStatus,
    pub endpoint: String,
    pub symbol: String,
    pub http_status: u16,
    pub forecast_len: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Success,
    Denied,
    Fail,
}

impl ApiRequestMetrics {
    pub fn new(start_time: DateTime<Utc>, endpoint: &str, symbol: &str) -> Self {
        Self {
            start_time,
            end_time: start_time,
            duration_ms: 0,
            status: ApiStatus::Success,
            endpoint: endpoint.to_string(),
            symbol: symbol.to_string(),
            http_status: 200,
            forecast_len: 0,
            error_message: None,
        }
    }

    pub fn complete(&mut self) {
        self.end_time = Utc::now();
        self.duration_ms = (self.end_time - self.start_time).num_milliseconds().max(0) as u64;
    }

    /// One log line, newline-terminated
    pub fn format_line(&self) -> String {
        let status_str = match self.status {
            ApiStatus::Success => "OK",
            ApiStatus::Denied => "DENIED",
            ApiStatus::Fail => "FAIL",
        };

        let duration_str = if self.duration_ms >= 1000 {
            format!("{}.{:01}s", self.duration_ms / 1000, (self.duration_ms % 1000) / 100)
        } else {
            format!("{}ms", self.duration_ms)
        };

        let error_info = match &self.error_message {
            Some(error) => format!(" error:{}", error),
            None => String::new(),
        };

        format!(
            "{} | {} | {} | {} | {} | http:{} symbol:{} forecast:{}{}\n",
            self.start_time.format("%Y-%m-%d %H:%M:%S"),
            self.end_time.format("%Y-%m-%d %H:%M:%S"),
            duration_str,
            self.endpoint,
            status_str,
            self.http_status,
            self.symbol,
            self.forecast_len,
            error_info
        )
    }
}

/// Append-only request log in the log directory
#[derive(Debug, Clone)]
pub struct ApiLogger {
    path: PathBuf,
}

impl ApiLogger {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(API_LOG_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort; a failed write is only reported through tracing
    pub fn write(&self, metrics: &ApiRequestMetrics) {
        if let Err(e) = write_with_rotation(&self.path, &metrics.format_line(), API_LOG_MAX_BYTES, API_LOG_BACKUPS) {
            warn!(path = %self.path.display(), error = %e, "Failed to write API request log");
        }
    }
}
