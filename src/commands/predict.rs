use crate::error::AppError;
use crate::services::Pipeline;
use crate::utils::normalize_symbol;
use std::path::Path;

/// Forecast the next closes for one symbol with the saved model
pub fn run(config_path: &Path, symbol: String) {
    let config = super::bootstrap(config_path);

    let symbol = match normalize_symbol(&symbol) {
        Some(s) => s,
        None => {
            eprintln!("❌ Invalid symbol '{}': expected BASE/QUOTE, e.g. BTC/USD", symbol);
            std::process::exit(1);
        }
    };

    let pipeline = match Pipeline::from_config(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Failed to build pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = super::runtime();
    let result = runtime.block_on(async {
        pipeline.load_model().await?;
        pipeline.forecast(&symbol).await
    });

    match result {
        Ok(predictions) => {
            println!("🔮 {} next {} close(s) on {}:", symbol, predictions.len(), pipeline.primary_exchange());
            for (step, price) in predictions.iter().enumerate() {
                println!("   t+{}: {:.4}", step + 1, price);
            }
        }
        Err(AppError::ModelNotFound(path)) => {
            eprintln!("⚠️  Model not found at {}. Please train the model first.", path);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Prediction failed: {}", e);
            std::process::exit(1);
        }
    }
}
