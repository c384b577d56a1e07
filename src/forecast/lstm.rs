//! Batched LSTM layer with backpropagation through time
//!
//! Gate pre-activations are computed in one product against kernels whose
//! columns are stacked `[input | forget | cell | output]`, each `hidden` wide.

use ndarray::{s, Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayer {
    input_size: usize,
    hidden_size: usize,
    /// Input kernel `[input_size, 4 * hidden]`
    pub(crate) w: Array2<f64>,
    /// Recurrent kernel `[hidden, 4 * hidden]`
    pub(crate) u: Array2<f64>,
    pub(crate) b: Array1<f64>,
}

/// Gradients matching the layer's parameters
pub struct LstmGrads {
    pub w: Array2<f64>,
    pub u: Array2<f64>,
    pub b: Array1<f64>,
}

/// Per-step activations kept for the backward pass
struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    c: Array2<f64>,
    h: Array2<f64>,
    tanh_c: Array2<f64>,
}

/// Record of one forward pass over a sequence
pub struct LstmTrace {
    steps: Vec<StepCache>,
}

impl LstmTrace {
    /// Hidden state at every step, `[batch, hidden]` each
    pub fn outputs(&self) -> Vec<Array2<f64>> {
        self.steps.iter().map(|s| s.h.clone()).collect()
    }

    pub fn last_output(&self) -> Option<&Array2<f64>> {
        self.steps.last().map(|s| &s.h)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl LstmLayer {
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        let gates = 4 * hidden_size;
        let w_limit = (6.0 / (input_size + gates) as f64).sqrt();
        let u_limit = (6.0 / (hidden_size + gates) as f64).sqrt();

        // forget gate starts open
        let mut b = Array1::zeros(gates);
        b.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);

        Self {
            input_size,
            hidden_size,
            w: Array2::random((input_size, gates), Uniform::new(-w_limit, w_limit)),
            u: Array2::random((hidden_size, gates), Uniform::new(-u_limit, u_limit)),
            b,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn step(&self, x: &Array2<f64>, h_prev: &Array2<f64>, c_prev: &Array2<f64>) -> StepCache {
        let h = self.hidden_size;
        let z = x.dot(&self.w) + h_prev.dot(&self.u) + &self.b;

        let i = z.slice(s![.., 0..h]).mapv(sigmoid);
        let f = z.slice(s![.., h..2 * h]).mapv(sigmoid);
        let g = z.slice(s![.., 2 * h..3 * h]).mapv(f64::tanh);
        let o = z.slice(s![.., 3 * h..]).mapv(sigmoid);

        let c = &f * c_prev + &i * &g;
        let tanh_c = c.mapv(f64::tanh);
        let h_next = &o * &tanh_c;

        StepCache {
            x: x.clone(),
            h_prev: h_prev.clone(),
            c_prev: c_prev.clone(),
            i,
            f,
            g,
            o,
            c,
            h: h_next,
            tanh_c,
        }
    }

    /// Run a sequence of `[batch, input_size]` steps from zero state
    pub fn forward(&self, inputs: &[Array2<f64>]) -> LstmTrace {
        let batch = inputs.first().map(|x| x.nrows()).unwrap_or(0);
        let mut h = Array2::zeros((batch, self.hidden_size));
        let mut c = Array2::zeros((batch, self.hidden_size));
        let mut steps = Vec::with_capacity(inputs.len());

        for x in inputs {
            let cache = self.step(x, &h, &c);
            h = cache.h.clone();
            c = cache.c.clone();
            steps.push(cache);
        }

        LstmTrace { steps }
    }

    /// Backpropagate `d_outputs` (one `[batch, hidden]` gradient per step)
    ///
    /// Returns parameter gradients and the gradient w.r.t. each input step.
    pub fn backward(&self, trace: &LstmTrace, d_outputs: &[Array2<f64>]) -> (LstmGrads, Vec<Array2<f64>>) {
        let h = self.hidden_size;
        let mut grads = LstmGrads {
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
        };

        let batch = trace.steps.first().map(|s| s.x.nrows()).unwrap_or(0);
        let mut dh_next = Array2::<f64>::zeros((batch, h));
        let mut dc_next = Array2::<f64>::zeros((batch, h));
        let mut d_inputs = vec![Array2::zeros((batch, self.input_size)); trace.steps.len()];
        let mut dz = Array2::<f64>::zeros((batch, 4 * h));

        for (t, cache) in trace.steps.iter().enumerate().rev() {
            let dh = &d_outputs[t] + &dh_next;

            let d_o = &dh * &cache.tanh_c;
            let dc = &dh * &cache.o * &cache.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;
            let d_i = &dc * &cache.g;
            let d_g = &dc * &cache.i;
            let d_f = &dc * &cache.c_prev;
            dc_next = &dc * &cache.f;

            dz.slice_mut(s![.., 0..h])
                .assign(&(&d_i * &cache.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., h..2 * h])
                .assign(&(&d_f * &cache.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * h..3 * h])
                .assign(&(&d_g * &cache.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * h..])
                .assign(&(&d_o * &cache.o.mapv(|v| v * (1.0 - v))));

            grads.w += &cache.x.t().dot(&dz);
            grads.u += &cache.h_prev.t().dot(&dz);
            grads.b += &dz.sum_axis(Axis(0));

            d_inputs[t] = dz.dot(&self.w.t());
            dh_next = dz.dot(&self.u.t());
        }

        (grads, d_inputs)
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}
