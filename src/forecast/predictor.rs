use super::network::{Network, NetworkConfig};
use super::scaler::MinMaxScaler;
use crate::error::{AppError, Result};
use crate::models::{Frame, ModelConfig};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Array2, Array3, Axis};
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::thread_rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bumped whenever the persisted layout changes
const ARTIFACT_VERSION: u32 = 2;

/// Lifecycle of the underlying network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// No network exists yet
    Unbuilt,
    /// Network allocated but training has not finished
    Built,
    /// Trained in this process or loaded from disk
    Trained,
}

/// Everything needed to serve forecasts after a restart
#[derive(Serialize, Deserialize)]
struct ModelArtifact {
    version: u32,
    network: Network,
    /// Close-price range per pair key
    scalers: BTreeMap<String, MinMaxScaler>,
}

/// Scaled sliding windows: `x` is `[n, input_steps, 1]`, `y` is `[n, forecast_steps]`
#[derive(Debug, Clone)]
pub struct Windows {
    pub x: Array3<f64>,
    pub y: Array2<f64>,
}

impl Windows {
    pub fn len(&self) -> usize {
        self.x.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One network shared by every pair; prices are scaled with each pair's own range
pub struct Predictor {
    config: ModelConfig,
    scalers: BTreeMap<String, MinMaxScaler>,
    network: Option<Network>,
    state: ModelState,
    show_progress: bool,
}

impl Predictor {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            scalers: BTreeMap::new(),
            network: None,
            state: ModelState::Unbuilt,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while training
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ModelState::Trained
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Range fitted when `key` was last trained on
    pub fn scaler(&self, key: &str) -> Option<&MinMaxScaler> {
        self.scalers.get(key)
    }

    pub fn default_path(&self) -> &Path {
        &self.config.path
    }

    /// Fit a scaler on the frame's closes and slide windows over them
    ///
    /// The fitted range is kept for `key` only when at least one window exists,
    /// so a frame too short to train on leaves the stored ranges untouched.
    pub fn prepare_data(&mut self, key: &str, frame: &Frame) -> Result<Windows> {
        let closes = frame.close()?;
        if closes.is_empty() {
            return Ok(self.windows(&[]));
        }

        let mut scaler = MinMaxScaler::new();
        let scaled = scaler.fit_transform(&closes)?;
        let windows = self.windows(&scaled);
        if !windows.is_empty() {
            self.scalers.insert(key.to_string(), scaler);
        }
        Ok(windows)
    }

    /// Windows scaled with the range stored for `key`, or one fitted on this frame
    pub fn prepare_inference(&self, key: &str, frame: &Frame) -> Result<(Windows, MinMaxScaler)> {
        let closes = frame.close()?;
        let scaler = match self.scalers.get(key) {
            Some(scaler) => *scaler,
            None => {
                debug!(key = %key, "No stored range for pair, fitting on inference data");
                let mut scaler = MinMaxScaler::new();
                if !closes.is_empty() {
                    scaler.fit(&closes)?;
                }
                scaler
            }
        };

        if closes.is_empty() {
            return Ok((self.windows(&[]), scaler));
        }
        let scaled = scaler.transform(&closes)?;
        Ok((self.windows(&scaled), scaler))
    }

    fn windows(&self, scaled: &[f64]) -> Windows {
        make_windows(scaled, self.config.input_steps, self.config.forecast_steps)
    }

    /// The most recent input window as a batch of one
    pub fn latest_window(x: &Array3<f64>) -> Result<Array3<f64>> {
        let n = x.shape()[0];
        if n == 0 {
            return Err(AppError::InsufficientData(
                "no input windows; the series is shorter than input_steps + forecast_steps".to_string(),
            ));
        }
        Ok(x.slice(s![n - 1..n, .., ..]).to_owned())
    }

    /// Fit the network, building it first if needed; returns the final epoch's mean loss
    pub fn train(&mut self, x: &Array3<f64>, y: &Array2<f64>, epochs: usize, batch_size: usize) -> Result<f64> {
        let samples = x.shape()[0];
        if samples == 0 {
            return Err(AppError::InsufficientData("no training windows".to_string()));
        }
        if y.shape()[0] != samples {
            return Err(AppError::InvalidInput(format!(
                "x has {} samples but y has {}",
                samples,
                y.shape()[0]
            )));
        }
        if epochs == 0 || batch_size == 0 {
            return Err(AppError::InvalidInput("epochs and batch_size must be positive".to_string()));
        }

        let show_progress = self.show_progress;
        let network = self.build()?;
        if y.shape()[1] != network.config().forecast_steps {
            return Err(AppError::InvalidInput(format!(
                "targets have {} steps, model forecasts {}",
                y.shape()[1],
                network.config().forecast_steps
            )));
        }

        let mut training = network.training_state();
        let progress = progress_bar(epochs, show_progress);
        let mut order: Vec<usize> = (0..samples).collect();
        let mut rng = thread_rng();
        let mut last_loss = f64::NAN;

        for epoch in 0..epochs {
            order.shuffle(&mut rng);
            let mut weighted = 0.0;

            for chunk in order.chunks(batch_size) {
                let xb = x.select(Axis(0), chunk);
                let yb = y.select(Axis(0), chunk);
                weighted += network.train_batch(&xb, &yb, &mut training) * chunk.len() as f64;
            }

            last_loss = weighted / samples as f64;
            if !last_loss.is_finite() {
                progress.abandon();
                return Err(AppError::Model(format!("training diverged at epoch {}", epoch + 1)));
            }

            debug!(epoch = epoch + 1, loss = last_loss, "Epoch finished");
            progress.set_message(format!("loss {:.6}", last_loss));
            progress.inc(1);
        }

        progress.finish_with_message(format!("loss {:.6}", last_loss));
        self.state = ModelState::Trained;
        info!(samples = samples, epochs = epochs, loss = last_loss, "Training complete");
        Ok(last_loss)
    }

    fn build(&mut self) -> Result<&mut Network> {
        if self.network.is_none() {
            let config = NetworkConfig {
                input_steps: self.config.input_steps,
                forecast_steps: self.config.forecast_steps,
                hidden_units: self.config.hidden_units,
                learning_rate: self.config.learning_rate,
            };
            debug!(?config, "Building network");
            self.network = Some(Network::new(config));
            self.state = ModelState::Built;
        }
        self.network
            .as_mut()
            .ok_or_else(|| AppError::Model("network could not be built".to_string()))
    }

    /// Forecast for every window in `x`, inverse-scaled with the range stored for `key`
    pub fn predict(&self, key: &str, x: &Array3<f64>) -> Result<Array2<f64>> {
        let scaler = self.scalers.get(key).ok_or(AppError::ModelNotAvailable)?;
        self.predict_with(scaler, x)
    }

    fn predict_with(&self, scaler: &MinMaxScaler, x: &Array3<f64>) -> Result<Array2<f64>> {
        let network = match (&self.network, self.state) {
            (Some(network), ModelState::Trained) if scaler.is_fitted() => network,
            _ => return Err(AppError::ModelNotAvailable),
        };
        if x.shape()[0] == 0 {
            return Err(AppError::InsufficientData("no input windows to predict on".to_string()));
        }

        let scaled = network.forward(x);
        let mut prices = Array2::<f64>::zeros(scaled.raw_dim());
        for (mut out, row) in prices.outer_iter_mut().zip(scaled.outer_iter()) {
            let restored = scaler.inverse_transform(&row.to_vec())?;
            out.assign(&ndarray::Array1::from(restored));
        }
        Ok(prices)
    }

    /// Windows from `frame`, then a forecast for its most recent window
    pub fn forecast_frame(&self, key: &str, frame: &Frame) -> Result<Vec<f64>> {
        if !self.is_ready() {
            // a series too short to window is reported ahead of the missing model
            let windows = self.windows(&frame.close()?);
            Self::latest_window(&windows.x)?;
            return Err(AppError::ModelNotAvailable);
        }
        let (windows, scaler) = self.prepare_inference(key, frame)?;
        let latest = Self::latest_window(&windows.x)?;
        let forecast = self.predict_with(&scaler, &latest)?;
        Ok(forecast.row(0).to_vec())
    }

    fn resolve<'a>(&'a self, path: Option<&'a Path>) -> &'a Path {
        path.unwrap_or(self.config.path.as_path())
    }

    /// Persist the network and every pair's range as one bincode artifact
    pub fn save_model(&self, path: Option<&Path>) -> Result<PathBuf> {
        let network = match (&self.network, self.state) {
            (Some(network), ModelState::Trained) => network,
            _ => return Err(AppError::ModelNotAvailable),
        };
        let path = self.resolve(path).to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let artifact = ModelArtifact {
            version: ARTIFACT_VERSION,
            network: network.clone(),
            scalers: self.scalers.clone(),
        };
        let bytes = bincode::serialize(&artifact)?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &path)?;

        info!(path = %path.display(), bytes = bytes.len(), "Model saved");
        Ok(path)
    }

    /// Restore the network and pair ranges; the model shape is taken from the artifact
    pub fn load_model(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let path = self.resolve(path).to_path_buf();
        if !path.exists() {
            return Err(AppError::ModelNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(&path)?;
        let artifact: ModelArtifact = bincode::deserialize(&bytes)?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(AppError::Model(format!(
                "unsupported model artifact version {} (expected {})",
                artifact.version, ARTIFACT_VERSION
            )));
        }

        let shape = artifact.network.config().clone();
        if shape.input_steps != self.config.input_steps || shape.forecast_steps != self.config.forecast_steps {
            warn!(
                saved_input_steps = shape.input_steps,
                saved_forecast_steps = shape.forecast_steps,
                "Model shape differs from configuration, using the saved shape"
            );
        }
        self.config.input_steps = shape.input_steps;
        self.config.forecast_steps = shape.forecast_steps;
        self.config.hidden_units = shape.hidden_units;

        self.network = Some(artifact.network);
        self.scalers = artifact.scalers;
        self.state = ModelState::Trained;

        info!(path = %path.display(), "Model loaded");
        Ok(path)
    }
}

/// Slide `input_steps` / `forecast_steps` windows over a series, one step apart
pub fn make_windows(series: &[f64], input_steps: usize, forecast_steps: usize) -> Windows {
    let n = (series.len() + 1).saturating_sub(input_steps + forecast_steps);
    let x = Array3::from_shape_fn((n, input_steps, 1), |(i, t, _)| series[i + t]);
    let y = Array2::from_shape_fn((n, forecast_steps), |(i, k)| series[i + input_steps + k]);
    Windows { x, y }
}

fn progress_bar(epochs: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(epochs as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} epochs {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "binance_BTC_USD";

    fn small_config(path: PathBuf) -> ModelConfig {
        ModelConfig {
            input_steps: 5,
            forecast_steps: 2,
            max_depth: 1,
            hidden_units: 4,
            learning_rate: 0.01,
            epochs: 2,
            batch_size: 8,
            path,
        }
    }

    fn frame(len: usize) -> Frame {
        let index = (0..len as i64).map(|i| 1_609_459_200_000 + i * 3_600_000).collect();
        let closes = (0..len).map(|i| 100.0 + (i as f64 * 0.5).sin() * 10.0).collect();
        Frame::from_columns(index, vec![("close", closes)]).unwrap()
    }

    #[test]
    fn test_window_count() {
        let series: Vec<f64> = (0..10).map(|v| v as f64).collect();
        let windows = make_windows(&series, 5, 2);
        assert_eq!(windows.len(), 10 - 5 - 2 + 1);
        assert_eq!(windows.x[[0, 4, 0]], 4.0);
        assert_eq!(windows.y[[0, 0]], 5.0);
        assert_eq!(windows.x[[3, 0, 0]], 3.0);
        assert_eq!(windows.y[[3, 1]], 9.0);
    }

    #[test]
    fn test_short_series_has_no_windows() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        let windows = predictor.prepare_data(KEY, &frame(6)).unwrap();
        assert!(windows.is_empty());
        assert!(predictor.scaler(KEY).is_none());
        assert!(matches!(
            Predictor::latest_window(&windows.x),
            Err(AppError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_predict_before_train() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        assert_eq!(predictor.state(), ModelState::Unbuilt);

        let windows = predictor.prepare_data(KEY, &frame(20)).unwrap();
        assert!(matches!(predictor.predict(KEY, &windows.x), Err(AppError::ModelNotAvailable)));
        assert!(matches!(predictor.save_model(None), Err(AppError::ModelNotAvailable)));
    }

    #[test]
    fn test_train_then_predict() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        let windows = predictor.prepare_data(KEY, &frame(30)).unwrap();

        let loss = predictor.train(&windows.x, &windows.y, 2, 8).unwrap();
        assert!(loss.is_finite());
        assert_eq!(predictor.state(), ModelState::Trained);

        let latest = Predictor::latest_window(&windows.x).unwrap();
        assert_eq!(latest.shape(), &[1, 5, 1]);
        let forecast = predictor.predict(KEY, &latest).unwrap();
        assert_eq!(forecast.shape(), &[1, 2]);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_train_rejects_empty_windows() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        let windows = make_windows(&[], 5, 2);
        assert!(matches!(
            predictor.train(&windows.x, &windows.y, 1, 1),
            Err(AppError::InsufficientData(_))
        ));
        assert_eq!(predictor.state(), ModelState::Unbuilt);
    }

    #[test]
    fn test_predict_empty_after_training() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        let windows = predictor.prepare_data(KEY, &frame(20)).unwrap();
        predictor.train(&windows.x, &windows.y, 1, 4).unwrap();

        let empty = Array3::zeros((0, 5, 1));
        assert!(matches!(predictor.predict(KEY, &empty), Err(AppError::InsufficientData(_))));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");

        let mut trained = Predictor::new(small_config(path.clone()));
        let windows = trained.prepare_data(KEY, &frame(25)).unwrap();
        trained.train(&windows.x, &windows.y, 1, 4).unwrap();
        assert_eq!(trained.save_model(None).unwrap(), path);

        let mut restored = Predictor::new(small_config(path.clone()));
        restored.load_model(None).unwrap();
        assert_eq!(restored.state(), ModelState::Trained);
        assert_eq!(
            restored.scaler(KEY).and_then(MinMaxScaler::range),
            trained.scaler(KEY).and_then(MinMaxScaler::range)
        );

        let latest = Predictor::latest_window(&windows.x).unwrap();
        let a = trained.predict(KEY, &latest).unwrap();
        let b = restored.predict(KEY, &latest).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut predictor = Predictor::new(small_config(dir.path().join("absent.bin")));
        assert!(matches!(predictor.load_model(None), Err(AppError::ModelNotFound(_))));
        assert_eq!(predictor.state(), ModelState::Unbuilt);
    }

    fn ramp(len: usize, start: f64) -> Frame {
        let index = (0..len as i64).collect();
        let closes = (0..len).map(|i| start + i as f64).collect();
        Frame::from_columns(index, vec![("close", closes)]).unwrap()
    }

    #[test]
    fn test_prepare_inference_reuses_fitted_range() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        predictor.prepare_data(KEY, &frame(30)).unwrap();
        let fitted = predictor.scaler(KEY).and_then(MinMaxScaler::range);

        let (windows, scaler) = predictor.prepare_inference(KEY, &ramp(20, 500.0)).unwrap();
        assert_eq!(scaler.range(), fitted);
        assert_eq!(predictor.scaler(KEY).and_then(MinMaxScaler::range), fitted);
        // values above the training range scale past 1.0
        assert!(windows.x[[0, 0, 0]] > 1.0);
    }

    #[test]
    fn test_ranges_are_kept_per_pair() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        predictor.prepare_data("binance_BTC_USD", &ramp(20, 30000.0)).unwrap();
        predictor.prepare_data("binance_ETH_USD", &ramp(20, 2000.0)).unwrap();

        assert_eq!(
            predictor.scaler("binance_BTC_USD").and_then(MinMaxScaler::range),
            Some((30000.0, 30019.0))
        );
        assert_eq!(
            predictor.scaler("binance_ETH_USD").and_then(MinMaxScaler::range),
            Some((2000.0, 2019.0))
        );
    }

    #[test]
    fn test_short_frame_keeps_stored_range() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        predictor.prepare_data(KEY, &ramp(20, 100.0)).unwrap();

        let windows = predictor.prepare_data(KEY, &ramp(4, 900.0)).unwrap();
        assert!(windows.is_empty());
        assert_eq!(predictor.scaler(KEY).and_then(MinMaxScaler::range), Some((100.0, 119.0)));
    }

    #[test]
    fn test_unseen_pair_is_scaled_on_its_own_data() {
        let mut predictor = Predictor::new(small_config(PathBuf::from("unused.bin")));
        let windows = predictor.prepare_data(KEY, &ramp(30, 100.0)).unwrap();
        predictor.train(&windows.x, &windows.y, 1, 8).unwrap();

        let (windows, scaler) = predictor.prepare_inference("coinbase_SOL_USD", &ramp(20, 5000.0)).unwrap();
        assert_eq!(scaler.range(), Some((5000.0, 5019.0)));
        assert!(windows.x.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(predictor.scaler("coinbase_SOL_USD").is_none());
        assert!(matches!(
            predictor.predict("coinbase_SOL_USD", &windows.x),
            Err(AppError::ModelNotAvailable)
        ));
    }
}
