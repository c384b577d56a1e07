use crate::services::AccessGate;
use std::path::Path;

/// Check a key against the allow-list in the config file
pub fn run(config_path: &Path, key: String) {
    let config = super::bootstrap(config_path);
    let gate = AccessGate::new(config_path, &config.api_keys.allowed_keys);

    let valid = super::runtime().block_on(gate.verify(Some(&key)));
    if valid {
        println!("✅ Key is valid");
    } else {
        println!("❌ Key is not in {}", config_path.display());
        std::process::exit(1);
    }
}
