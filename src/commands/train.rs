use crate::forecast::Predictor;
use crate::services::{Collector, Pipeline};
use std::path::Path;

/// Train on every collected pair and save the model
pub fn run(config_path: &Path, epochs: Option<usize>, batch_size: Option<usize>) {
    let config = super::bootstrap(config_path);
    let epochs = epochs.unwrap_or(config.model.epochs);
    let batch_size = batch_size.unwrap_or(config.model.batch_size);

    let collector = match Collector::from_config(&config.collector) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Failed to set up exchanges: {}", e);
            std::process::exit(1);
        }
    };
    let pipeline = Pipeline::new(
        collector,
        config.collector.primary_exchange(),
        config.model.max_depth,
        Predictor::new(config.model.clone()).with_progress(true),
    );

    println!(
        "🧠 Training on {} pair(s): {} epoch(s), batch size {}",
        config.collector.exchanges.len() * config.collector.symbols.len(),
        epochs,
        batch_size
    );

    let runtime = super::runtime();
    match runtime.block_on(pipeline.train_all(epochs, batch_size)) {
        Ok(report) => {
            println!("\n✅ Training completed. Final loss: {:.6}", report.final_loss);
            println!("   Trained on: {}", report.trained_keys.join(", "));
            if !report.skipped_keys.is_empty() {
                println!("   Skipped (too few rows): {}", report.skipped_keys.join(", "));
            }
            println!("   Model saved to {}", report.model_path.display());
        }
        Err(e) => {
            eprintln!("\n❌ Training failed: {}", e);
            std::process::exit(1);
        }
    }
}
