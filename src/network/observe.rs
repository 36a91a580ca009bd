//! Diagnostic side-channel for the refinement loop
//!
//! The original instrumentation recorded weight and activation summaries
//! after every refinement step. Here that side-channel is an observer trait
//! invoked between iterations, plus lightweight summary statistics emitted
//! through `tracing`. None of it affects the returned values.

use std::fmt;

use ndarray::{ArrayBase, Data, Dimension};
use ndarray::{Array2, Array3};

/// Per-step snapshot handed to a [`RefineObserver`]
///
/// All references stay valid only for the duration of the callback.
#[derive(Debug)]
pub struct StepSnapshot<'a> {
    /// Refinement step index, starting at 0
    pub step: usize,
    /// Attention weights `[L, batch, D]` for this step
    pub attention: &'a Array3<f64>,
    /// Raw recurrent-cell output `[batch, D]`
    pub output: &'a Array2<f64>,
    /// Attended context `r_k` `[batch, D]`
    pub context: &'a Array2<f64>,
    /// Hidden state propagated to the next step `[batch, D]`
    pub hidden: &'a Array2<f64>,
}

/// Observer of the attention-refinement loop
///
/// All methods default to no-ops; implement only what you need.
pub trait RefineObserver {
    /// Called after each refinement step completes
    fn on_refinement_step(&mut self, snapshot: &StepSnapshot<'_>) {
        let _ = snapshot;
    }
}

/// Observer that records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RefineObserver for NullObserver {}

/// Summary statistics of a tensor, for diagnostic logging
#[derive(Debug, Clone, Copy)]
pub struct TensorStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for TensorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean={:.4} std={:.4} min={:.4} max={:.4}",
            self.mean, self.std, self.min, self.max
        )
    }
}

/// Compute mean/std/min/max over all elements of a tensor
pub fn tensor_stats<S, D>(tensor: &ArrayBase<S, D>) -> TensorStats
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let n = tensor.len().max(1) as f64;
    let mean = tensor.sum() / n;
    let var = tensor.mapv(|v| (v - mean) * (v - mean)).sum() / n;
    let min = tensor.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = tensor.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    TensorStats {
        mean,
        std: var.sqrt(),
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_tensor_stats() {
        let t = array![[1.0, 2.0], [3.0, 4.0]];
        let stats = tensor_stats(&t);

        assert_abs_diff_eq!(stats.mean, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.min, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.max, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.std, (1.25f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_null_observer_is_a_noop() {
        let mut observer = NullObserver;
        let attention = Array3::zeros((1, 1, 1));
        let output = Array2::zeros((1, 1));

        observer.on_refinement_step(&StepSnapshot {
            step: 0,
            attention: &attention,
            output: &output,
            context: &output,
            hidden: &output,
        });
    }
}
