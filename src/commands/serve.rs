use crate::error::AppError;
use crate::server::{self, AppState};
use crate::services::{AccessGate, ApiLogger, PaymentProvider, Pipeline};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub fn run(config_path: &Path, port: Option<u16>) {
    let config = super::bootstrap(config_path);
    let port = port.unwrap_or(config.server.port);

    println!("🚀 Starting pricecast server on port {}", port);
    println!("📄 Config: {}", config_path.display());

    let pipeline = match Pipeline::from_config(&config) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("❌ Failed to build pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let payments = match PaymentProvider::from_config(&config.monetization) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("❌ Invalid monetization settings: {}", e);
            std::process::exit(1);
        }
    };

    let gate = Arc::new(AccessGate::new(config_path, &config.api_keys.allowed_keys));
    let api_log = ApiLogger::new(&config.logging.log_dir());
    println!("🔑 Allowed API keys: {}", config.api_keys.allowed_keys.len());
    println!("📝 Request log: {}", api_log.path().display());

    let runtime = super::runtime();
    runtime.block_on(async {
        match pipeline.load_model().await {
            Ok(path) => println!("✅ Model loaded from {}", path.display()),
            Err(AppError::ModelNotFound(path)) => {
                println!("⚠️  No model at {}; /predict returns 503 until `pricecast train` runs", path);
                tracing::warn!(path = %path, "Model not found, serving without a model");
            }
            Err(e) => {
                eprintln!("⚠️  Failed to load model: {}", e);
                tracing::error!(error = %e, "Model load failed");
            }
        }

        let app_state = AppState {
            pipeline,
            gate,
            payments,
            api_log,
            started_at: Instant::now(),
        };

        if let Err(e) = server::serve(app_state, port).await {
            eprintln!("❌ Server error: {}", e);
            std::process::exit(1);
        }
    });
}
