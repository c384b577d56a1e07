use ndarray::{Array, Dimension, Zip};

/// Adam hyper-parameters and step counter
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
}

/// First and second moment estimates for one parameter tensor
#[derive(Debug, Clone)]
pub struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    pub fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
        }
    }

    /// Advance the bias-correction counter; call once per batch
    pub fn next_step(&mut self) {
        self.t = self.t.saturating_add(1);
    }

    pub fn update<D: Dimension>(&self, param: &mut Array<f64, D>, grad: &Array<f64, D>, moments: &mut Moments<D>) {
        let (b1, b2) = (self.beta1, self.beta2);
        let t = self.t.max(1);
        let lr_t = self.learning_rate * (1.0 - b2.powi(t)).sqrt() / (1.0 - b1.powi(t));
        let eps = self.epsilon;

        moments.m.zip_mut_with(grad, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
        moments.v.zip_mut_with(grad, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);

        Zip::from(param)
            .and(&moments.m)
            .and(&moments.v)
            .for_each(|p, &m, &v| *p -= lr_t * m / (v.sqrt() + eps));
    }
}
