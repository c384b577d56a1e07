use crate::error::{AppError, Result};
use crate::forecast::Predictor;
use crate::models::{pair_key, AppConfig, FrameSet};
use crate::services::collector::Collector;
use crate::services::processor::{feature_engineering, preprocess};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Predictor shared by every request; train and predict take it exclusively
pub type SharedPredictor = Arc<Mutex<Predictor>>;

/// Outcome of a full training run
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Mean loss of the last epoch on the last trained frame
    pub final_loss: f64,
    pub trained_keys: Vec<String>,
    pub skipped_keys: Vec<String>,
    pub model_path: PathBuf,
}

/// collect -> preprocess -> feature-engineer -> predictor
pub struct Pipeline {
    collector: Collector,
    primary_exchange: String,
    max_depth: usize,
    predictor: SharedPredictor,
}

impl Pipeline {
    pub fn new(collector: Collector, primary_exchange: &str, max_depth: usize, predictor: Predictor) -> Self {
        Self {
            collector,
            primary_exchange: primary_exchange.to_string(),
            max_depth,
            predictor: Arc::new(Mutex::new(predictor)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            Collector::from_config(&config.collector)?,
            config.collector.primary_exchange(),
            config.model.max_depth,
            Predictor::new(config.model.clone()),
        ))
    }

    pub fn predictor(&self) -> SharedPredictor {
        self.predictor.clone()
    }

    pub fn primary_exchange(&self) -> &str {
        &self.primary_exchange
    }

    pub async fn model_loaded(&self) -> bool {
        self.predictor.lock().await.is_ready()
    }

    /// Restore the persisted model if there is one
    pub async fn load_model(&self) -> Result<PathBuf> {
        self.predictor.lock().await.load_model(None)
    }

    /// One collection cycle turned into feature frames
    pub async fn collect_frames(&self) -> FrameSet {
        let data = self.collector.collect_all().await;
        feature_engineering(preprocess(&data), self.max_depth)
    }

    /// Forecast the next closes of `symbol` (`BASE/QUOTE`) from the primary exchange
    pub async fn forecast(&self, symbol: &str) -> Result<Vec<f64>> {
        let frames = self.collect_frames().await;
        let key = pair_key(&self.primary_exchange, symbol);

        let frame = frames
            .get(&key)
            .ok_or_else(|| AppError::NotFound(format!("Data not found for {}", key)))?;

        let forecast = self.predictor.lock().await.forecast_frame(&key, frame)?;
        info!(key = %key, steps = forecast.len(), "Forecast produced");
        Ok(forecast)
    }

    /// Train on every frame in key order, saving after each; runs on a blocking thread
    pub async fn train_all(&self, epochs: usize, batch_size: usize) -> Result<TrainReport> {
        let frames = self.collect_frames().await;
        let predictor = self.predictor.clone();

        tokio::task::spawn_blocking(move || train_frames(&predictor, &frames, epochs, batch_size))
            .await
            .map_err(|e| AppError::Other(format!("training task failed: {}", e)))?
    }
}

fn train_frames(predictor: &SharedPredictor, frames: &FrameSet, epochs: usize, batch_size: usize) -> Result<TrainReport> {
    let mut predictor = predictor.blocking_lock();
    let mut final_loss = None;
    let mut trained_keys = Vec::new();
    let mut skipped_keys = Vec::new();
    let mut model_path = predictor.default_path().to_path_buf();

    for (key, frame) in frames {
        let windows = predictor.prepare_data(key, frame)?;
        if windows.is_empty() {
            warn!(key = %key, rows = frame.len(), "Too few rows to train on, skipping");
            skipped_keys.push(key.clone());
            continue;
        }

        info!(key = %key, windows = windows.len(), "Training");
        let loss = predictor.train(&windows.x, &windows.y, epochs, batch_size)?;
        model_path = predictor.save_model(None)?;

        trained_keys.push(key.clone());
        final_loss = Some(loss);
    }

    let final_loss = final_loss.ok_or_else(|| {
        AppError::InsufficientData("no frame has enough rows to build a training window".to_string())
    })?;

    Ok(TrainReport {
        final_loss,
        trained_keys,
        skipped_keys,
        model_path,
    })
}
