use crate::error::{AppError, Result};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// API-key allow-list backed by the `api_keys.allowed_keys` entry of the config file
pub struct AccessGate {
    config_path: PathBuf,
    keys: RwLock<HashSet<String>>,
    /// Serialises read-modify-write of the config file
    write_lock: Mutex<()>,
}

impl AccessGate {
    pub fn new<P: Into<PathBuf>>(config_path: P, allowed_keys: &[String]) -> Self {
        Self {
            config_path: config_path.into(),
            keys: RwLock::new(allowed_keys.iter().cloned().collect()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// True only for a non-empty key present in the allow-list
    pub async fn verify(&self, key: Option<&str>) -> bool {
        match key.map(str::trim) {
            Some(k) if !k.is_empty() => self.keys.read().await.contains(k),
            _ => false,
        }
    }

    pub async fn key_count(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Issue a fresh key, persist it, then admit it in memory
    pub async fn on_payment_completed(&self, customer_id: &str) -> Result<String> {
        let _guard = self.write_lock.lock().await;

        let key = Uuid::new_v4().to_string();
        append_key(&self.config_path, &key)?;
        self.keys.write().await.insert(key.clone());

        info!(
            customer_id = customer_id,
            key_prefix = &key[..8],
            "Issued API key after payment"
        );
        Ok(key)
    }
}

/// Append `key` to `api_keys.allowed_keys`, keeping every other entry of the document
fn append_key(path: &Path, key: &str) -> Result<()> {
    let mut doc = if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            Value::Mapping(Mapping::new())
        } else {
            serde_yaml::from_str(&contents)?
        }
    } else {
        Value::Mapping(Mapping::new())
    };

    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| AppError::Config(format!("{} is not a YAML mapping", path.display())))?;

    let api_keys = root
        .entry(Value::from("api_keys"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if api_keys.is_null() {
        *api_keys = Value::Mapping(Mapping::new());
    }
    let api_keys = api_keys
        .as_mapping_mut()
        .ok_or_else(|| AppError::Config("api_keys must be a mapping".to_string()))?;

    let allowed = api_keys
        .entry(Value::from("allowed_keys"))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    if allowed.is_null() {
        *allowed = Value::Sequence(Vec::new());
    }
    allowed
        .as_sequence_mut()
        .ok_or_else(|| AppError::Config("api_keys.allowed_keys must be a list".to_string()))?
        .push(Value::from(key));

    let serialized = serde_yaml::to_string(&doc)?;
    write_atomic(path, serialized.as_bytes())?;
    debug!(path = %path.display(), "Allow-list persisted");
    Ok(())
}

/// Write through a sibling temp file and rename it over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| AppError::Config(format!("invalid config path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_verify() {
        let gate = AccessGate::new("unused.yaml", &["key-1".to_string()]);
        assert!(gate.verify(Some("key-1")).await);
        assert!(!gate.verify(Some("key-2")).await);
        assert!(!gate.verify(Some("")).await);
        assert!(!gate.verify(None).await);
    }

    #[tokio::test]
    async fn test_payment_appends_key_and_preserves_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "server:\n  port: 9000\napi_keys:\n  allowed_keys: [existing]\nmonetization:\n  currency: eur\n",
        )
        .unwrap();

        let gate = AccessGate::new(&path, &["existing".to_string()]);
        let key = gate.on_payment_completed("cus_123").await.unwrap();

        assert!(Uuid::parse_str(&key).is_ok());
        assert!(gate.verify(Some(&key)).await);

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded.api_keys.allowed_keys, vec!["existing".to_string(), key]);
        assert_eq!(reloaded.server.port, 9000);
        assert_eq!(reloaded.monetization.currency, "eur");
    }

    #[tokio::test]
    async fn test_payment_creates_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api_keys:\n").unwrap();

        let gate = AccessGate::new(&path, &[]);
        let key = gate.on_payment_completed("unknown").await.unwrap();

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded.api_keys.allowed_keys, vec![key]);
    }

    #[tokio::test]
    async fn test_concurrent_payments_keep_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let gate = Arc::new(AccessGate::new(&path, &[]));
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.on_payment_completed(&format!("cus_{}", i)).await })
            })
            .collect();

        let mut issued = Vec::new();
        for task in futures::future::join_all(tasks).await {
            issued.push(task.unwrap().unwrap());
        }

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded.api_keys.allowed_keys.len(), 8);
        for key in &issued {
            assert!(reloaded.api_keys.allowed_keys.contains(key));
        }
        assert_eq!(gate.key_count().await, 8);
    }

    #[tokio::test]
    async fn test_rejects_non_mapping_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "- just\n- a list\n").unwrap();

        let gate = AccessGate::new(&path, &[]);
        assert!(gate.on_payment_completed("cus").await.is_err());
        assert_eq!(gate.key_count().await, 0);
    }
}
