//! Attention-driven recurrent query refinement
//!
//! Implements the full-context-embedding loop for the query side:
//! `f(x, S) = attLSTM(x, g(S), K)`. A single recurrent cell is advanced a
//! fixed number of steps with the constant query as input; each step
//! attends over the candidate set and folds the attended context into the
//! state carried to the next step.

use ndarray::{stack, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::lstm::LstmCell;
use super::observe::{tensor_stats, NullObserver, RefineObserver, StepSnapshot};
use crate::error::{RefinerError, Result};

/// Fixed-depth attention-refinement loop over a candidate set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionRefiner {
    /// Recurrent cell of width D (input and hidden widths coincide)
    cell: LstmCell,
    /// Number of refinement iterations (fixed depth, no early termination)
    num_steps: usize,
}

impl AttentionRefiner {
    /// Create a refiner with freshly initialized cell parameters
    pub fn new(embedding_dim: usize, num_steps: usize) -> Result<Self> {
        if embedding_dim == 0 {
            return Err(RefinerError::InvalidConfig(
                "refiner embedding width must be positive".to_string(),
            ));
        }
        Self::from_cell(LstmCell::new(embedding_dim, embedding_dim), num_steps)
    }

    /// Create a refiner around an existing cell
    ///
    /// Lets several refiners of different depth share one parameter set.
    /// The cell must map width-D inputs to width-D hidden states.
    pub fn from_cell(cell: LstmCell, num_steps: usize) -> Result<Self> {
        if num_steps == 0 {
            return Err(RefinerError::InvalidConfig(
                "num_refinement_steps must be at least 1".to_string(),
            ));
        }
        if cell.input_size != cell.hidden_size {
            return Err(RefinerError::InvalidConfig(format!(
                "refiner cell must be square, got input {} and hidden {}",
                cell.input_size, cell.hidden_size
            )));
        }
        Ok(Self { cell, num_steps })
    }

    /// Refine one query batch against a candidate sequence
    ///
    /// # Arguments
    /// * `query` - Query batch `[batch, D]`
    /// * `candidates` - Sequence of length L of `[batch, D]` batches
    ///
    /// # Returns
    /// The refined query `[batch, D]`: the raw cell output of the final
    /// iteration. Note that this is deliberately not the residual-plus-
    /// context value threaded between iterations; see the tests.
    pub fn refine_query(
        &self,
        query: &Array2<f64>,
        candidates: &[Array2<f64>],
    ) -> Result<Array2<f64>> {
        self.refine_query_observed(query, candidates, &mut NullObserver)
    }

    /// Like [`refine_query`](Self::refine_query), reporting each step to an
    /// observer
    pub fn refine_query_observed(
        &self,
        query: &Array2<f64>,
        candidates: &[Array2<f64>],
        observer: &mut dyn RefineObserver,
    ) -> Result<Array2<f64>> {
        self.validate(query, candidates)?;

        let views: Vec<_> = candidates.iter().map(|c| c.view()).collect();
        let candidate_tensor: Array3<f64> =
            stack(Axis(0), &views).expect("candidates share one shape after validation");

        let batch_size = query.nrows();
        let (mut h_prev, mut c_prev) = self.cell.init_state(batch_size);
        let mut output = Array2::zeros(query.raw_dim());

        for step in 0..self.num_steps {
            let (raw_output, c_next) = self.cell.forward(query, &h_prev, &c_prev);

            // Residual combination anchors the state on the query itself
            let h_k = &raw_output + query;

            // Content-based attention against the previous hidden state,
            // one L-way distribution per batch element and feature dimension
            let weights = softmax_over_candidates(&(&candidate_tensor * &h_prev));
            let r_k = (&weights * &candidate_tensor).sum_axis(Axis(0));

            let hidden_next = &h_k + &r_k;

            trace!(
                step,
                attention = %tensor_stats(&weights),
                output = %tensor_stats(&raw_output),
                context = %tensor_stats(&r_k),
                "refinement step"
            );
            observer.on_refinement_step(&StepSnapshot {
                step,
                attention: &weights,
                output: &raw_output,
                context: &r_k,
                hidden: &hidden_next,
            });

            // Cell memory carries forward; the hidden slot is replaced by
            // the residual-plus-context value
            h_prev = hidden_next;
            c_prev = c_next;
            output = raw_output;
        }

        Ok(output)
    }

    /// Number of refinement iterations
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Embedding width D
    pub fn embedding_dim(&self) -> usize {
        self.cell.hidden_size
    }

    fn validate(&self, query: &Array2<f64>, candidates: &[Array2<f64>]) -> Result<()> {
        if candidates.is_empty() {
            return Err(RefinerError::EmptyCandidateSet);
        }
        if query.ncols() != self.cell.hidden_size {
            return Err(RefinerError::shape(
                (query.nrows(), self.cell.hidden_size),
                (query.nrows(), query.ncols()),
                "query embedding",
            ));
        }
        for c in candidates {
            if c.nrows() != query.nrows() || c.ncols() != query.ncols() {
                return Err(RefinerError::shape(
                    (query.nrows(), query.ncols()),
                    (c.nrows(), c.ncols()),
                    "candidate vs query",
                ));
            }
        }
        Ok(())
    }
}

/// Softmax over the candidate axis of a `[L, batch, D]` score tensor
///
/// Each of the `batch * D` columns gets its own L-way distribution. The
/// per-column maximum is subtracted before exponentiation for numerical
/// stability.
pub(crate) fn softmax_over_candidates(scores: &Array3<f64>) -> Array3<f64> {
    let max = scores.fold_axis(Axis(0), f64::NEG_INFINITY, |m, &v| m.max(v));
    let exp = (scores - &max).mapv(f64::exp);
    let denom = exp.sum_axis(Axis(0));
    exp / &denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand_distr::StandardNormal;
    use ndarray_rand::RandomExt;

    fn random_sequence(len: usize, batch: usize, dim: usize) -> Vec<Array2<f64>> {
        (0..len)
            .map(|_| Array2::random((batch, dim), StandardNormal))
            .collect()
    }

    #[test]
    fn test_softmax_normalizes_each_column() {
        let scores = Array3::random((5, 3, 4), StandardNormal);
        let weights = softmax_over_candidates(&scores);

        assert!(weights.iter().all(|&w| w >= 0.0));
        let sums = weights.sum_axis(Axis(0));
        for &s in sums.iter() {
            assert_abs_diff_eq!(s, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_softmax_singleton_is_one() {
        let scores = Array3::random((1, 2, 6), StandardNormal);
        let weights = softmax_over_candidates(&scores);

        for &w in weights.iter() {
            assert_abs_diff_eq!(w, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_refined_query_shape() {
        let refiner = AttentionRefiner::new(12, 3).unwrap();
        let query = Array2::random((4, 12), StandardNormal);
        let candidates = random_sequence(6, 4, 12);

        let refined = refiner.refine_query(&query, &candidates).unwrap();

        assert_eq!(refined.shape(), &[4, 12]);
        assert!(refined.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_singleton_candidate_context_equals_candidate() {
        // With L = 1 the attended context at every step is the sole
        // candidate; verify through the observer.
        struct ContextCheck {
            candidate: Array2<f64>,
        }
        impl RefineObserver for ContextCheck {
            fn on_refinement_step(&mut self, snapshot: &StepSnapshot<'_>) {
                for (a, b) in snapshot.context.iter().zip(self.candidate.iter()) {
                    assert_abs_diff_eq!(a, b, epsilon = 1e-12);
                }
            }
        }

        let refiner = AttentionRefiner::new(8, 4).unwrap();
        let query = Array2::random((2, 8), StandardNormal);
        let candidate = Array2::random((2, 8), StandardNormal);
        let mut check = ContextCheck {
            candidate: candidate.clone(),
        };

        refiner
            .refine_query_observed(&query, &[candidate], &mut check)
            .unwrap();
    }

    #[test]
    fn test_final_output_is_raw_cell_output() {
        // The returned embedding is the last step's raw cell output, not
        // the residual-plus-context value threaded between steps. Capture
        // both through the observer and compare.
        #[derive(Default)]
        struct Capture {
            last_output: Option<Array2<f64>>,
            last_hidden: Option<Array2<f64>>,
        }
        impl RefineObserver for Capture {
            fn on_refinement_step(&mut self, snapshot: &StepSnapshot<'_>) {
                self.last_output = Some(snapshot.output.clone());
                self.last_hidden = Some(snapshot.hidden.clone());
            }
        }

        let refiner = AttentionRefiner::new(10, 5).unwrap();
        let query = Array2::random((3, 10), StandardNormal);
        let candidates = random_sequence(4, 3, 10);

        let mut capture = Capture::default();
        let refined = refiner
            .refine_query_observed(&query, &candidates, &mut capture)
            .unwrap();

        assert_eq!(refined, capture.last_output.unwrap());
        assert_ne!(refined, capture.last_hidden.unwrap());
    }

    #[test]
    fn test_step_count_changes_output() {
        // Same parameters, different depth: the result must differ.
        let cell = LstmCell::new(8, 8);
        let shallow = AttentionRefiner::from_cell(cell.clone(), 2).unwrap();
        let deep = AttentionRefiner::from_cell(cell, 5).unwrap();

        let query = Array2::random((2, 8), StandardNormal);
        let candidates = random_sequence(5, 2, 8);

        let a = shallow.refine_query(&query, &candidates).unwrap();
        let b = deep.refine_query(&query, &candidates).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_empty_candidates() {
        let refiner = AttentionRefiner::new(8, 2).unwrap();
        let query = Array2::zeros((2, 8));

        assert!(matches!(
            refiner.refine_query(&query, &[]),
            Err(RefinerError::EmptyCandidateSet)
        ));
    }

    #[test]
    fn test_rejects_batch_mismatch() {
        let refiner = AttentionRefiner::new(8, 2).unwrap();
        let query = Array2::zeros((2, 8));
        let candidates = vec![Array2::zeros((3, 8))];

        assert!(matches!(
            refiner.refine_query(&query, &candidates),
            Err(RefinerError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_steps() {
        assert!(AttentionRefiner::new(8, 0).is_err());
    }
}
