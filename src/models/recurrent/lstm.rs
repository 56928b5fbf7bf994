//! A small stacked LSTM regression network.
//!
//! Gates are packed `[input, forget, cell, output]` per cell. Training is
//! full-batch gradient descent with Adam and backpropagation through time
//! over the fixed-length input window; gradients are clipped by global norm
//! so a bad epoch cannot blow up the weights. Weights are seeded, so two
//! networks built with the same seed produce identical forecasts.

use crate::error::{EngineError, Result};
use ndarray::{s, Array, Array1, Array2, Axis, Dimension, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const GRADIENT_CLIP_NORM: f64 = 5.0;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// One LSTM layer. Weight rows are the four packed gates.
#[derive(Debug, Clone)]
struct LstmCell {
    hidden_dim: usize,
    w_ih: Array2<f64>,
    w_hh: Array2<f64>,
    bias: Array1<f64>,
}

/// Cached activations of one cell at one timestep, kept for the backward
/// pass.
struct CellStep {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    c: Array1<f64>,
    tanh_c: Array1<f64>,
    h: Array1<f64>,
}

impl LstmCell {
    fn new(input_dim: usize, hidden_dim: usize, rng: &mut StdRng) -> Self {
        let bound = (1.0 / hidden_dim as f64).sqrt();
        let dist = Uniform::new(-bound, bound);
        let w_ih = Array2::random_using((4 * hidden_dim, input_dim), dist, rng);
        let w_hh = Array2::random_using((4 * hidden_dim, hidden_dim), dist, rng);
        let mut bias = Array1::random_using(4 * hidden_dim, dist, rng);
        // Forget gate bias starts at one so early training keeps memory.
        bias.slice_mut(s![hidden_dim..2 * hidden_dim])
            .mapv_inplace(|b| b + 1.0);
        Self {
            hidden_dim,
            w_ih,
            w_hh,
            bias,
        }
    }

    fn forward(&self, x: &Array1<f64>, h_prev: &Array1<f64>, c_prev: &Array1<f64>) -> CellStep {
        let h = self.hidden_dim;
        let z = self.w_ih.dot(x) + self.w_hh.dot(h_prev) + &self.bias;
        let i = z.slice(s![0..h]).mapv(sigmoid);
        let f = z.slice(s![h..2 * h]).mapv(sigmoid);
        let g = z.slice(s![2 * h..3 * h]).mapv(f64::tanh);
        let o = z.slice(s![3 * h..4 * h]).mapv(sigmoid);
        let c = &f * c_prev + &i * &g;
        let tanh_c = c.mapv(f64::tanh);
        let h_state = &o * &tanh_c;
        CellStep {
            x: x.clone(),
            h_prev: h_prev.clone(),
            c_prev: c_prev.clone(),
            i,
            f,
            g,
            o,
            c,
            tanh_c,
            h: h_state,
        }
    }

    /// One BPTT step. Accumulates weight gradients into `grads` and returns
    /// (input gradient, previous hidden gradient, previous cell gradient).
    fn backward(
        &self,
        step: &CellStep,
        dh: &Array1<f64>,
        dc_in: &Array1<f64>,
        grads: &mut CellGrads,
    ) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
        let h = self.hidden_dim;
        let dtanh = step.tanh_c.mapv(|v| 1.0 - v * v);
        let dc = dc_in + &(dh * &step.o * &dtanh);

        let d_o = dh * &step.tanh_c;
        let d_f = &dc * &step.c_prev;
        let d_i = &dc * &step.g;
        let d_g = &dc * &step.i;
        let dc_prev = &dc * &step.f;

        let dz_i = &d_i * &step.i * &step.i.mapv(|v| 1.0 - v);
        let dz_f = &d_f * &step.f * &step.f.mapv(|v| 1.0 - v);
        let dz_g = &d_g * &step.g.mapv(|v| 1.0 - v * v);
        let dz_o = &d_o * &step.o * &step.o.mapv(|v| 1.0 - v);

        let mut dz = Array1::zeros(4 * h);
        dz.slice_mut(s![0..h]).assign(&dz_i);
        dz.slice_mut(s![h..2 * h]).assign(&dz_f);
        dz.slice_mut(s![2 * h..3 * h]).assign(&dz_g);
        dz.slice_mut(s![3 * h..4 * h]).assign(&dz_o);

        let dz2 = dz.view().insert_axis(Axis(1));
        grads.w_ih += &dz2.dot(&step.x.view().insert_axis(Axis(0)));
        grads.w_hh += &dz2.dot(&step.h_prev.view().insert_axis(Axis(0)));
        grads.bias += &dz;

        let dx = self.w_ih.t().dot(&dz);
        let dh_prev = self.w_hh.t().dot(&dz);
        (dx, dh_prev, dc_prev)
    }
}

#[derive(Debug, Clone)]
struct CellGrads {
    w_ih: Array2<f64>,
    w_hh: Array2<f64>,
    bias: Array1<f64>,
}

impl CellGrads {
    fn zeros_like(cell: &LstmCell) -> Self {
        Self {
            w_ih: Array2::zeros(cell.w_ih.raw_dim()),
            w_hh: Array2::zeros(cell.w_hh.raw_dim()),
            bias: Array1::zeros(cell.bias.raw_dim()),
        }
    }
}

#[derive(Debug, Clone)]
struct NetworkGrads {
    cells: Vec<CellGrads>,
    readout_w: Array1<f64>,
    readout_b: f64,
}

impl NetworkGrads {
    fn zeros_like(net: &LstmNetwork) -> Self {
        Self {
            cells: net.cells.iter().map(CellGrads::zeros_like).collect(),
            readout_w: Array1::zeros(net.readout_w.raw_dim()),
            readout_b: 0.0,
        }
    }

    fn scale(&mut self, factor: f64) {
        for cell in &mut self.cells {
            cell.w_ih *= factor;
            cell.w_hh *= factor;
            cell.bias *= factor;
        }
        self.readout_w *= factor;
        self.readout_b *= factor;
    }

    fn global_norm(&self) -> f64 {
        let mut sum = self.readout_b * self.readout_b;
        sum += self.readout_w.iter().map(|g| g * g).sum::<f64>();
        for cell in &self.cells {
            sum += cell.w_ih.iter().map(|g| g * g).sum::<f64>();
            sum += cell.w_hh.iter().map(|g| g * g).sum::<f64>();
            sum += cell.bias.iter().map(|g| g * g).sum::<f64>();
        }
        sum.sqrt()
    }

    fn clip(&mut self, max_norm: f64) {
        let norm = self.global_norm();
        if norm > max_norm {
            self.scale(max_norm / norm);
        }
    }
}

/// Adam first/second moment estimates, mirroring the parameter layout.
struct AdamState {
    moments: NetworkGrads,
    velocities: NetworkGrads,
    step: i32,
}

impl AdamState {
    fn new(net: &LstmNetwork) -> Self {
        Self {
            moments: NetworkGrads::zeros_like(net),
            velocities: NetworkGrads::zeros_like(net),
            step: 0,
        }
    }

    fn apply(&mut self, net: &mut LstmNetwork, grads: &NetworkGrads, lr: f64) {
        self.step += 1;
        let t = self.step;
        for ((cell, grad), (m, v)) in net
            .cells
            .iter_mut()
            .zip(grads.cells.iter())
            .zip(self.moments.cells.iter_mut().zip(self.velocities.cells.iter_mut()))
        {
            adam_update(&mut cell.w_ih, &grad.w_ih, &mut m.w_ih, &mut v.w_ih, lr, t);
            adam_update(&mut cell.w_hh, &grad.w_hh, &mut m.w_hh, &mut v.w_hh, lr, t);
            adam_update(&mut cell.bias, &grad.bias, &mut m.bias, &mut v.bias, lr, t);
        }
        adam_update(
            &mut net.readout_w,
            &grads.readout_w,
            &mut self.moments.readout_w,
            &mut self.velocities.readout_w,
            lr,
            t,
        );
        let m = &mut self.moments.readout_b;
        let v = &mut self.velocities.readout_b;
        let g = grads.readout_b;
        *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
        *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
        let m_hat = *m / (1.0 - ADAM_BETA1.powi(t));
        let v_hat = *v / (1.0 - ADAM_BETA2.powi(t));
        net.readout_b -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
    }
}

fn adam_update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    lr: f64,
    t: i32,
) {
    let bias1 = 1.0 - ADAM_BETA1.powi(t);
    let bias2 = 1.0 - ADAM_BETA2.powi(t);
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        });
}

/// Stacked LSTM layers with a scalar linear readout over the last hidden
/// state.
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    input_dim: usize,
    hidden_dim: usize,
    cells: Vec<LstmCell>,
    readout_w: Array1<f64>,
    readout_b: f64,
}

impl LstmNetwork {
    pub fn new(input_dim: usize, hidden_dim: usize, num_layers: usize, seed: u64) -> Result<Self> {
        if input_dim == 0 || hidden_dim == 0 || num_layers == 0 {
            return Err(EngineError::InvalidParameter(
                "network dimensions must all be at least 1".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let cells = (0..num_layers)
            .map(|layer| {
                let in_dim = if layer == 0 { input_dim } else { hidden_dim };
                LstmCell::new(in_dim, hidden_dim, &mut rng)
            })
            .collect();
        let bound = (1.0 / hidden_dim as f64).sqrt();
        let readout_w = Array1::random_using(hidden_dim, Uniform::new(-bound, bound), &mut rng);

        Ok(Self {
            input_dim,
            hidden_dim,
            cells,
            readout_w,
            readout_b: 0.0,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Predict the next scaled target from a window of feature rows.
    pub fn predict(&self, window: &[Vec<f64>]) -> Result<f64> {
        let (prediction, _) = self.forward(window)?;
        Ok(prediction)
    }

    fn forward(&self, window: &[Vec<f64>]) -> Result<(f64, Vec<Vec<CellStep>>)> {
        if window.is_empty() {
            return Err(EngineError::EmptyData);
        }

        let mut caches: Vec<Vec<CellStep>> = self.cells.iter().map(|_| Vec::new()).collect();
        let mut hidden: Vec<Array1<f64>> = self
            .cells
            .iter()
            .map(|_| Array1::zeros(self.hidden_dim))
            .collect();
        let mut memory = hidden.clone();

        for row in window {
            if row.len() != self.input_dim {
                return Err(EngineError::DimensionMismatch {
                    expected: self.input_dim,
                    got: row.len(),
                });
            }
            let mut x = Array1::from(row.clone());
            for (layer, cell) in self.cells.iter().enumerate() {
                let step = cell.forward(&x, &hidden[layer], &memory[layer]);
                hidden[layer] = step.h.clone();
                memory[layer] = step.c.clone();
                x = step.h.clone();
                caches[layer].push(step);
            }
        }

        let last = self.cells.len() - 1;
        let prediction = self.readout_w.dot(&hidden[last]) + self.readout_b;
        Ok((prediction, caches))
    }

    /// Accumulate one sample's gradients into `grads`; returns its squared
    /// error.
    fn backward_sample(
        &self,
        window: &[Vec<f64>],
        target: f64,
        grads: &mut NetworkGrads,
    ) -> Result<f64> {
        let (prediction, caches) = self.forward(window)?;
        let error = prediction - target;
        let dy = 2.0 * error;

        let steps = window.len();
        let top = self.cells.len() - 1;
        let last_h = &caches[top][steps - 1].h;
        grads.readout_w += &last_h.mapv(|v| dy * v);
        grads.readout_b += dy;

        // Gradient arriving at each layer's hidden output, per timestep.
        let mut dh_above: Vec<Array1<f64>> =
            (0..steps).map(|_| Array1::zeros(self.hidden_dim)).collect();
        dh_above[steps - 1] = self.readout_w.mapv(|w| dy * w);

        for layer in (0..self.cells.len()).rev() {
            let cell = &self.cells[layer];
            let in_dim = if layer == 0 {
                self.input_dim
            } else {
                self.hidden_dim
            };
            let mut dh_next = Array1::zeros(self.hidden_dim);
            let mut dc_next = Array1::zeros(self.hidden_dim);
            let mut dx_below: Vec<Array1<f64>> =
                (0..steps).map(|_| Array1::zeros(in_dim)).collect();

            for t in (0..steps).rev() {
                let dh = &dh_above[t] + &dh_next;
                let (dx, dh_prev, dc_prev) =
                    cell.backward(&caches[layer][t], &dh, &dc_next, &mut grads.cells[layer]);
                dh_next = dh_prev;
                dc_next = dc_prev;
                dx_below[t] = dx;
            }
            dh_above = dx_below;
        }

        Ok(error * error)
    }

    /// Full-batch training. Returns the final epoch's mean squared error.
    pub fn fit(
        &mut self,
        inputs: &[Vec<Vec<f64>>],
        targets: &[f64],
        epochs: usize,
        learning_rate: f64,
    ) -> Result<f64> {
        if inputs.is_empty() {
            return Err(EngineError::EmptyData);
        }
        if inputs.len() != targets.len() {
            return Err(EngineError::DimensionMismatch {
                expected: inputs.len(),
                got: targets.len(),
            });
        }

        let mut optimizer = AdamState::new(self);
        let mut loss = f64::NAN;
        let scale = 1.0 / inputs.len() as f64;

        for epoch in 0..epochs {
            let mut grads = NetworkGrads::zeros_like(self);
            let mut epoch_loss = 0.0;
            for (window, &target) in inputs.iter().zip(targets.iter()) {
                epoch_loss += self.backward_sample(window, target, &mut grads)?;
            }
            epoch_loss *= scale;
            if !epoch_loss.is_finite() {
                return Err(EngineError::Computation(format!(
                    "non-finite training loss at epoch {epoch}"
                )));
            }

            grads.scale(scale);
            grads.clip(GRADIENT_CLIP_NORM);
            optimizer.apply(self, &grads, learning_rate);
            loss = epoch_loss;

            if (epoch + 1) % 10 == 0 {
                debug!(epoch = epoch + 1, loss = epoch_loss, "training progress");
            }
        }

        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_samples(value: f64, count: usize) -> (Vec<Vec<Vec<f64>>>, Vec<f64>) {
        let window = vec![vec![value, 1.0 - value]; 4];
        let inputs = vec![window; count];
        let targets = vec![value; count];
        (inputs, targets)
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        assert!(LstmNetwork::new(0, 4, 1, 1).is_err());
        assert!(LstmNetwork::new(3, 0, 1, 1).is_err());
        assert!(LstmNetwork::new(3, 4, 0, 1).is_err());
    }

    #[test]
    fn same_seed_gives_identical_predictions() {
        let window = vec![vec![0.1, 0.9], vec![0.4, 0.6], vec![0.7, 0.3]];
        let a = LstmNetwork::new(2, 8, 2, 7).unwrap();
        let b = LstmNetwork::new(2, 8, 2, 7).unwrap();
        assert_eq!(a.predict(&window).unwrap(), b.predict(&window).unwrap());

        let c = LstmNetwork::new(2, 8, 2, 8).unwrap();
        assert_ne!(a.predict(&window).unwrap(), c.predict(&window).unwrap());
    }

    #[test]
    fn rejects_mismatched_window_width() {
        let net = LstmNetwork::new(3, 4, 1, 1).unwrap();
        let err = net.predict(&[vec![1.0, 2.0]]).unwrap_err();
        assert_eq!(err, EngineError::DimensionMismatch { expected: 3, got: 2 });
    }

    #[test]
    fn learns_a_constant_target() {
        let (inputs, targets) = constant_samples(0.5, 6);
        let mut net = LstmNetwork::new(2, 8, 2, 42).unwrap();

        let final_loss = net.fit(&inputs, &targets, 200, 0.01).unwrap();

        assert!(final_loss.is_finite());
        assert!(final_loss < 0.05, "final loss {final_loss}");
        let pred = net.predict(&inputs[0]).unwrap();
        assert!((pred - 0.5).abs() < 0.1, "prediction {pred}");
    }

    #[test]
    fn fit_rejects_mismatched_targets() {
        let (inputs, _) = constant_samples(0.5, 3);
        let mut net = LstmNetwork::new(2, 4, 1, 1).unwrap();
        assert!(net.fit(&inputs, &[0.5], 1, 0.01).is_err());
        assert!(net.fit(&[], &[], 1, 0.01).is_err());
    }
}
