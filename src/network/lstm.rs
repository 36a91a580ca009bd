//! Batched LSTM cell
//!
//! A single recurrent cell that consumes `(input, state)` and produces
//! `(output, new state)`, vectorised over the batch dimension. Both the
//! bidirectional set encoder and the attention-refinement loop are built
//! on top of it.

use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

/// LSTM cell with per-gate weights
///
/// All tensors carry the batch dimension first: inputs are
/// `[batch, input_size]`, states are `[batch, hidden_size]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmCell {
    /// Input width
    pub input_size: usize,
    /// Hidden state width
    pub hidden_size: usize,

    // Input gate
    w_ii: Array2<f64>,
    w_hi: Array2<f64>,
    b_i: Array1<f64>,

    // Forget gate
    w_if: Array2<f64>,
    w_hf: Array2<f64>,
    b_f: Array1<f64>,

    // Cell candidate
    w_ig: Array2<f64>,
    w_hg: Array2<f64>,
    b_g: Array1<f64>,

    // Output gate
    w_io: Array2<f64>,
    w_ho: Array2<f64>,
    b_o: Array1<f64>,
}

impl LstmCell {
    /// Create a new cell with uniform `±1/sqrt(hidden_size)` initialization
    ///
    /// The forget-gate bias starts at 1.0 so that early iterations keep
    /// their cell memory.
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();

        Self {
            input_size,
            hidden_size,
            w_ii: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_hi: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_i: Array1::zeros(hidden_size),
            w_if: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_hf: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_f: Array1::from_elem(hidden_size, 1.0),
            w_ig: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_hg: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_g: Array1::zeros(hidden_size),
            w_io: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_ho: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_o: Array1::zeros(hidden_size),
        }
    }

    /// Advance the cell by one step
    ///
    /// # Arguments
    ///
    /// * `x` - Input batch `[batch, input_size]`
    /// * `h_prev` - Previous hidden state `[batch, hidden_size]`
    /// * `c_prev` - Previous cell memory `[batch, hidden_size]`
    ///
    /// # Returns
    ///
    /// `(h_next, c_next)` - the new hidden state (also the cell output) and
    /// the new cell memory, both `[batch, hidden_size]`
    pub fn forward(
        &self,
        x: &Array2<f64>,
        h_prev: &Array2<f64>,
        c_prev: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>) {
        // i = σ(x W_ii^T + h W_hi^T + b_i)
        let i_gate = sigmoid(&(x.dot(&self.w_ii.t()) + h_prev.dot(&self.w_hi.t()) + &self.b_i));

        // f = σ(x W_if^T + h W_hf^T + b_f)
        let f_gate = sigmoid(&(x.dot(&self.w_if.t()) + h_prev.dot(&self.w_hf.t()) + &self.b_f));

        // g = tanh(x W_ig^T + h W_hg^T + b_g)
        let g = tanh(&(x.dot(&self.w_ig.t()) + h_prev.dot(&self.w_hg.t()) + &self.b_g));

        // o = σ(x W_io^T + h W_ho^T + b_o)
        let o_gate = sigmoid(&(x.dot(&self.w_io.t()) + h_prev.dot(&self.w_ho.t()) + &self.b_o));

        let c_next = &f_gate * c_prev + &i_gate * &g;
        let h_next = &o_gate * &tanh(&c_next);

        (h_next, c_next)
    }

    /// Zero-initialized `(h, c)` state for a given batch size
    pub fn init_state(&self, batch_size: usize) -> (Array2<f64>, Array2<f64>) {
        (
            Array2::zeros((batch_size, self.hidden_size)),
            Array2::zeros((batch_size, self.hidden_size)),
        )
    }
}

fn sigmoid(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

fn tanh(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.tanh())
}
