//! Bidirectional set encoder for candidate embeddings
//!
//! Folds whole-set context into each candidate embedding:
//! `g(x_i, S) = x_i + concat(h_i(->), h_i(<-))`, where the two hidden
//! sequences come from independent forward and backward recurrent passes
//! of half width each.

use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::lstm::LstmCell;
use super::observe::tensor_stats;
use crate::error::{RefinerError, Result};

/// Bidirectional recurrent encoder over an ordered candidate sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEncoder {
    /// Embedding width D (each directional cell has width D/2)
    embedding_dim: usize,
    /// Forward (left-to-right) cell
    fw_cell: LstmCell,
    /// Backward (right-to-left) cell
    bw_cell: LstmCell,
}

impl SetEncoder {
    /// Create a new encoder for embeddings of width `embedding_dim`
    ///
    /// The width must be even: the forward and backward cells each produce
    /// half of it, so that the concatenated output matches the input width.
    pub fn new(embedding_dim: usize) -> Result<Self> {
        if embedding_dim == 0 {
            return Err(RefinerError::InvalidConfig(
                "encoder embedding width must be positive".to_string(),
            ));
        }
        if embedding_dim % 2 != 0 {
            return Err(RefinerError::OddEmbeddingWidth(embedding_dim));
        }

        let half = embedding_dim / 2;
        Ok(Self {
            embedding_dim,
            fw_cell: LstmCell::new(embedding_dim, half),
            bw_cell: LstmCell::new(embedding_dim, half),
        })
    }

    /// Encode a candidate sequence with bidirectional context
    ///
    /// # Arguments
    /// * `candidates` - Ordered sequence of length L of `[batch, D]` batches
    ///
    /// # Returns
    /// A sequence of the same length, `encoded[i] = candidates[i] +
    /// concat(fw_out[i], bw_out[i])`, each element `[batch, D]`
    pub fn encode(&self, candidates: &[Array2<f64>]) -> Result<Vec<Array2<f64>>> {
        self.validate(candidates)?;
        let batch_size = candidates[0].nrows();

        // Forward pass, left to right
        let mut fw_outputs = Vec::with_capacity(candidates.len());
        let (mut h, mut c) = self.fw_cell.init_state(batch_size);
        for x in candidates {
            let (h_next, c_next) = self.fw_cell.forward(x, &h, &c);
            fw_outputs.push(h_next.clone());
            h = h_next;
            c = c_next;
        }

        // Backward pass, right to left; outputs stored back in sequence order
        let mut bw_outputs = vec![Array2::zeros((0, 0)); candidates.len()];
        let (mut h, mut c) = self.bw_cell.init_state(batch_size);
        for (i, x) in candidates.iter().enumerate().rev() {
            let (h_next, c_next) = self.bw_cell.forward(x, &h, &c);
            bw_outputs[i] = h_next.clone();
            h = h_next;
            c = c_next;
        }

        let encoded: Vec<Array2<f64>> = candidates
            .iter()
            .zip(fw_outputs.iter().zip(bw_outputs.iter()))
            .map(|(x, (fw, bw))| {
                let bidir = concatenate(Axis(1), &[fw.view(), bw.view()])
                    .expect("forward and backward halves share the batch dimension");
                x + &bidir
            })
            .collect();

        for (i, out) in encoded.iter().enumerate() {
            trace!(position = i, stats = %tensor_stats(out), "encoded candidate");
        }

        Ok(encoded)
    }

    /// Embedding width D
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn validate(&self, candidates: &[Array2<f64>]) -> Result<()> {
        if candidates.is_empty() {
            return Err(RefinerError::EmptyCandidateSet);
        }

        let batch_size = candidates[0].nrows();
        for x in candidates {
            if x.nrows() != batch_size || x.ncols() != self.embedding_dim {
                return Err(RefinerError::shape(
                    (batch_size, self.embedding_dim),
                    (x.nrows(), x.ncols()),
                    "candidate sequence element",
                ));
            }
        }
        Ok(())
    }
}
