pub mod collect;
pub mod predict;
pub mod serve;
pub mod train;
pub mod verify_key;

use crate::models::AppConfig;
use crate::services::init_logging;
use std::path::Path;

/// Load configuration and install logging, exiting the process on failure
pub(crate) fn bootstrap(config_path: &Path) -> AppConfig {
    let config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("❌ Failed to initialise logging: {}", e);
        std::process::exit(1);
    }

    config
}

pub(crate) fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ Failed to create async runtime: {}", e);
            std::process::exit(1);
        }
    }
}
