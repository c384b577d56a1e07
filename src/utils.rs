use crate::constants::DEFAULT_CONFIG_PATH;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Config path: explicit flag, then `PRICECAST_CONFIG`, then `config.yaml`
pub fn get_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var("PRICECAST_CONFIG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Accept `BTC_USD`, `BTC-USD` or `BTC/USD` (any case) and return `BTC/USD`
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let cleaned = raw.trim().to_uppercase().replace(['_', '-'], "/");
    let mut parts = cleaned.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
            Some(format!("{}/{}", base, quote))
        }
        _ => None,
    }
}

/// Shift `path` to `path.1`, `path.1` to `path.2` and so on, dropping the oldest
pub fn rotate_file(path: &Path, backups: usize) -> std::io::Result<()> {
    if backups == 0 {
        return match fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
    }

    let numbered = |n: usize| {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    };

    let oldest = numbered(backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..backups).rev() {
        let from = numbered(n);
        if from.exists() {
            fs::rename(&from, numbered(n + 1))?;
        }
    }
    if path.exists() {
        fs::rename(path, numbered(1))?;
    }
    Ok(())
}

/// Append `line` to `path`, rotating first if it would grow past `max_bytes`
pub fn write_with_rotation(path: &Path, line: &str, max_bytes: u64, backups: usize) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let current = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if current > 0 && current + line.len() as u64 > max_bytes {
        rotate_file(path, backups)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("BTC_USD").as_deref(), Some("BTC/USD"));
        assert_eq!(normalize_symbol("btc-usd").as_deref(), Some("BTC/USD"));
        assert_eq!(normalize_symbol("ETH/USDT").as_deref(), Some("ETH/USDT"));
        assert_eq!(normalize_symbol("BTCUSD"), None);
        assert_eq!(normalize_symbol("BTC_"), None);
        assert_eq!(normalize_symbol("A_B_C"), None);
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = get_config_path(Some(Path::new("custom.yaml")));
        assert_eq!(path, PathBuf::from("custom.yaml"));
    }

    #[test]
    fn test_write_with_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("api.log");

        for i in 0..5 {
            write_with_rotation(&path, &format!("line {:04}\n", i), 20, 2).unwrap();
        }

        // each line is 10 bytes, so every file holds two lines
        assert_eq!(fs::read_to_string(&path).unwrap(), "line 0004\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("logs").join("api.log.1")).unwrap(),
            "line 0002\nline 0003\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("logs").join("api.log.2")).unwrap(),
            "line 0000\nline 0001\n"
        );
        assert!(!dir.path().join("logs").join("api.log.3").exists());
    }

    #[test]
    fn test_rotation_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        for i in 0..4 {
            write_with_rotation(&path, &format!("entry {:03}\n", i), 10, 1).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "entry 003\n");
        assert_eq!(fs::read_to_string(dir.path().join("app.log.1")).unwrap(), "entry 002\n");
        assert!(!dir.path().join("app.log.2").exists());
    }
}
