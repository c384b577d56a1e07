//! Recurrent price forecaster
//!
//! Closing prices are min-max scaled, cut into sliding windows and fed to a
//! two-layer LSTM with a dense head trained by Adam on mean squared error.

mod lstm;
mod network;
mod optimizer;
mod predictor;
mod scaler;

pub use network::{mse, Network, NetworkConfig};
pub use predictor::{make_windows, ModelState, Predictor, Windows};
pub use scaler::MinMaxScaler;
