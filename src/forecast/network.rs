use super::lstm::{LstmGrads, LstmLayer};
use super::optimizer::{Adam, Moments};
use ndarray::{s, Array1, Array2, Array3, Axis, Ix1, Ix2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

/// Shape and optimiser settings the network was built with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_steps: usize,
    pub forecast_steps: usize,
    pub hidden_units: usize,
    pub learning_rate: f64,
}

/// Fully connected output layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub(crate) weights: Array2<f64>,
    pub(crate) biases: Array1<f64>,
}

impl Dense {
    pub fn new(input_size: usize, output_size: usize) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        Self {
            weights: Array2::random((input_size, output_size), Uniform::new(-limit, limit)),
            biases: Array1::zeros(output_size),
        }
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weights) + &self.biases
    }
}

/// Two stacked LSTM layers feeding a dense head: one scaled close in, `forecast_steps` out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    config: NetworkConfig,
    first: LstmLayer,
    second: LstmLayer,
    head: Dense,
}

/// Adam moments for every parameter tensor of a [`Network`]
pub struct TrainingState {
    adam: Adam,
    first: LstmMoments,
    second: LstmMoments,
    head_w: Moments<Ix2>,
    head_b: Moments<Ix1>,
}

struct LstmMoments {
    w: Moments<Ix2>,
    u: Moments<Ix2>,
    b: Moments<Ix1>,
}

impl LstmMoments {
    fn for_layer(layer: &LstmLayer) -> Self {
        Self {
            w: Moments::zeros_like(&layer.w),
            u: Moments::zeros_like(&layer.u),
            b: Moments::zeros_like(&layer.b),
        }
    }

    fn apply(&mut self, adam: &Adam, layer: &mut LstmLayer, grads: &LstmGrads) {
        adam.update(&mut layer.w, &grads.w, &mut self.w);
        adam.update(&mut layer.u, &grads.u, &mut self.u);
        adam.update(&mut layer.b, &grads.b, &mut self.b);
    }
}

impl Network {
    pub fn new(config: NetworkConfig) -> Self {
        let hidden = config.hidden_units;
        Self {
            first: LstmLayer::new(1, hidden),
            second: LstmLayer::new(hidden, hidden),
            head: Dense::new(hidden, config.forecast_steps),
            config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn training_state(&self) -> TrainingState {
        TrainingState {
            adam: Adam::new(self.config.learning_rate),
            first: LstmMoments::for_layer(&self.first),
            second: LstmMoments::for_layer(&self.second),
            head_w: Moments::zeros_like(&self.head.weights),
            head_b: Moments::zeros_like(&self.head.biases),
        }
    }

    /// `[batch, steps, 1]` -> one `[batch, 1]` matrix per step
    fn steps(x: &Array3<f64>) -> Vec<Array2<f64>> {
        (0..x.shape()[1])
            .map(|t| x.slice(s![.., t, ..]).to_owned())
            .collect()
    }

    /// Forecast for each window in `x` (`[batch, steps, 1]`), still scaled
    pub fn forward(&self, x: &Array3<f64>) -> Array2<f64> {
        let batch = x.shape()[0];
        let first = self.first.forward(&Self::steps(x));
        let second = self.second.forward(&first.outputs());
        match second.last_output() {
            Some(h) => self.head.forward(h),
            None => Array2::zeros((batch, self.config.forecast_steps)),
        }
    }

    /// One optimisation step on a batch; returns the batch MSE before the update
    pub fn train_batch(&mut self, x: &Array3<f64>, y: &Array2<f64>, state: &mut TrainingState) -> f64 {
        let inputs = Self::steps(x);
        if inputs.is_empty() || x.shape()[0] == 0 {
            return 0.0;
        }

        let first = self.first.forward(&inputs);
        let hidden = first.outputs();
        let second = self.second.forward(&hidden);
        let last = match second.last_output() {
            Some(h) => h.clone(),
            None => return 0.0,
        };
        let prediction = self.head.forward(&last);

        let diff = &prediction - y;
        let loss = mse(&prediction, y);

        // d(mean squared error) / d(prediction)
        let d_pred = diff * (2.0 / y.len() as f64);
        let d_head_w = last.t().dot(&d_pred);
        let d_head_b = d_pred.sum_axis(Axis(0));
        let d_last = d_pred.dot(&self.head.weights.t());

        let mut d_second = vec![Array2::zeros(last.raw_dim()); second.len()];
        if let Some(slot) = d_second.last_mut() {
            *slot = d_last;
        }
        let (second_grads, d_hidden) = self.second.backward(&second, &d_second);
        let (first_grads, _) = self.first.backward(&first, &d_hidden);

        state.adam.next_step();
        state.first.apply(&state.adam, &mut self.first, &first_grads);
        state.second.apply(&state.adam, &mut self.second, &second_grads);
        state.adam.update(&mut self.head.weights, &d_head_w, &mut state.head_w);
        state.adam.update(&mut self.head.biases, &d_head_b, &mut state.head_b);

        loss
    }
}

/// Mean squared error over every element
pub fn mse(prediction: &Array2<f64>, target: &Array2<f64>) -> f64 {
    (prediction - target).mapv(|d| d * d).mean().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NetworkConfig {
        NetworkConfig {
            input_steps: 6,
            forecast_steps: 2,
            hidden_units: 8,
            learning_rate: 0.01,
        }
    }

    #[test]
    fn test_forward_shape() {
        let net = Network::new(config());
        let x = Array3::zeros((4, 6, 1));
        assert_eq!(net.forward(&x).shape(), &[4, 2]);
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut net = Network::new(config());
        let mut state = net.training_state();

        // windows over a slow sine wave, target is the next two values
        let series: Vec<f64> = (0..40).map(|i| 0.5 + 0.4 * (i as f64 * 0.3).sin()).collect();
        let n = series.len() - 6 - 2 + 1;
        let x = Array3::from_shape_fn((n, 6, 1), |(i, t, _)| series[i + t]);
        let y = Array2::from_shape_fn((n, 2), |(i, k)| series[i + 6 + k]);

        let initial = mse(&net.forward(&x), &y);
        for _ in 0..150 {
            net.train_batch(&x, &y, &mut state);
        }
        let trained = mse(&net.forward(&x), &y);

        assert!(trained < initial, "loss {} did not drop below {}", trained, initial);
    }
}
