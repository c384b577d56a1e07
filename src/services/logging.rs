use crate::error::Result;
use crate::models::{LogFileConfig, LoggingConfig};
use crate::utils::rotate_file;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Append-only log file that rotates itself once it reaches `max_size` bytes
pub struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    backups: usize,
    file: File,
    size: u64,
}

impl RotatingFile {
    pub fn open(config: &LogFileConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.filename.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = Self::append(&config.filename)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path: config.filename.clone(),
            max_size: config.max_size,
            backups: config.backup_count,
            file,
            size,
        })
    }

    fn append(path: &Path) -> std::io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.file.flush()?;
        rotate_file(&self.path, self.backups)?;
        self.file = Self::append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

/// Install the global subscriber; `RUST_LOG` overrides `logging.level`
///
/// Calling this again in the same process is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let console = config
        .console_enabled()
        .then(|| fmt::layer().with_target(false));

    let file = match config.file_target() {
        Some(target) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(RotatingFile::open(target)?)),
        ),
        None => None,
    };

    // a second initialisation attempt fails harmlessly
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();

    Ok(())
}
