//! Embedding refiner orchestration
//!
//! Composes the bidirectional set encoder and the attention-refinement
//! loop behind the single entry point the matching pipeline calls. The two
//! parameter sets are created once at construction and reused by every
//! call, so repeated refinement within one session is consistent.

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::attention::AttentionRefiner;
use super::encoder::SetEncoder;
use super::observe::{NullObserver, RefineObserver};
use crate::config::RefinerConfig;
use crate::error::{RefinerError, Result};

/// Refiner for left (query) and right (candidate) hypercolumn embeddings
///
/// # Example
/// ```
/// use hypercolumn_refiner::{EmbeddingRefiner, RefinerConfig};
/// use ndarray::Array2;
///
/// let refiner = EmbeddingRefiner::new(RefinerConfig::new(32)).unwrap();
///
/// let left = Array2::zeros((4, 32));
/// let rights: Vec<Array2<f64>> = (0..10).map(|_| Array2::zeros((4, 32))).collect();
///
/// let (refined_left, refined_rights) = refiner.refine(&left, &rights, true, true).unwrap();
/// assert_eq!(refined_left.shape(), &[4, 32]);
/// assert_eq!(refined_rights.len(), 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRefiner {
    /// Construction-time configuration
    config: RefinerConfig,
    /// Candidate-side encoder; absent when the width is odd and right
    /// refinement is not configured
    encoder: Option<SetEncoder>,
    /// Query-side attention refiner
    query_refiner: AttentionRefiner,
}

impl EmbeddingRefiner {
    /// Create a refiner, initializing both parameter sets once
    pub fn new(config: RefinerConfig) -> Result<Self> {
        config.validate()?;

        let encoder = if config.embedding_dimensions % 2 == 0 {
            Some(SetEncoder::new(config.embedding_dimensions)?)
        } else {
            None
        };
        let query_refiner = AttentionRefiner::new(
            config.embedding_dimensions,
            config.num_refinement_steps,
        )?;

        Ok(Self {
            config,
            encoder,
            query_refiner,
        })
    }

    /// Refine both sides of a correspondence problem
    ///
    /// # Arguments
    /// * `left` - Query embedding batch `[batch, D]`
    /// * `rights` - Ordered candidate sequence of length L, each `[batch, D]`
    /// * `refine_left` - Whether to refine the query (pass-through otherwise)
    /// * `refine_right` - Whether to encode the candidates (pass-through otherwise)
    ///
    /// # Returns
    /// `(refined_left, refined_rights)`. When a side is not refined its
    /// input is returned unchanged. The query always attends over the
    /// candidate sequence this call produced, encoded or raw.
    pub fn refine(
        &self,
        left: &Array2<f64>,
        rights: &[Array2<f64>],
        refine_left: bool,
        refine_right: bool,
    ) -> Result<(Array2<f64>, Vec<Array2<f64>>)> {
        self.refine_observed(left, rights, refine_left, refine_right, &mut NullObserver)
    }

    /// Like [`refine`](Self::refine), reporting each query-refinement step
    /// to an observer
    pub fn refine_observed(
        &self,
        left: &Array2<f64>,
        rights: &[Array2<f64>],
        refine_left: bool,
        refine_right: bool,
        observer: &mut dyn RefineObserver,
    ) -> Result<(Array2<f64>, Vec<Array2<f64>>)> {
        self.validate(left, rights)?;

        debug!(
            batch = left.nrows(),
            width = left.ncols(),
            candidates = rights.len(),
            refine_left,
            refine_right,
            "refining embeddings"
        );

        let refined_rights = if refine_right {
            let encoder = self
                .encoder
                .as_ref()
                .ok_or(RefinerError::OddEmbeddingWidth(self.config.embedding_dimensions))?;
            encoder.encode(rights)?
        } else {
            rights.to_vec()
        };

        let refined_left = if refine_left {
            self.query_refiner
                .refine_query_observed(left, &refined_rights, observer)?
        } else {
            left.clone()
        };

        Ok((refined_left, refined_rights))
    }

    /// Construction-time configuration
    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    /// Embedding width D
    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dimensions
    }

    /// Save the learned parameters to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    /// Load a refiner from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        let refiner: Self = bincode::deserialize(&data)?;
        Ok(refiner)
    }

    fn validate(&self, left: &Array2<f64>, rights: &[Array2<f64>]) -> Result<()> {
        if rights.is_empty() {
            return Err(RefinerError::EmptyCandidateSet);
        }

        let expected = (left.nrows(), self.config.embedding_dimensions);
        if left.ncols() != self.config.embedding_dimensions {
            return Err(RefinerError::shape(
                expected,
                (left.nrows(), left.ncols()),
                "left embedding",
            ));
        }
        for r in rights {
            if (r.nrows(), r.ncols()) != expected {
                return Err(RefinerError::shape(
                    expected,
                    (r.nrows(), r.ncols()),
                    "right embedding",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_rand::rand_distr::StandardNormal;
    use ndarray_rand::RandomExt;

    fn random_sequence(len: usize, batch: usize, dim: usize) -> Vec<Array2<f64>> {
        (0..len)
            .map(|_| Array2::random((batch, dim), StandardNormal))
            .collect()
    }

    #[test]
    fn test_pass_through_identity() {
        let refiner = EmbeddingRefiner::new(RefinerConfig::new(16)).unwrap();
        let left = Array2::random((3, 16), StandardNormal);
        let rights = random_sequence(5, 3, 16);

        let (out_left, out_rights) = refiner.refine(&left, &rights, false, false).unwrap();

        assert_eq!(out_left, left);
        assert_eq!(out_rights, rights);
    }

    #[test]
    fn test_left_only_attends_raw_candidates() {
        let refiner = EmbeddingRefiner::new(RefinerConfig::new(16)).unwrap();
        let left = Array2::random((2, 16), StandardNormal);
        let rights = random_sequence(4, 2, 16);

        let (out_left, out_rights) = refiner.refine(&left, &rights, true, false).unwrap();

        assert_eq!(out_rights, rights);
        assert_ne!(out_left, left);
        assert_eq!(out_left.shape(), left.shape());
    }

    #[test]
    fn test_repeated_calls_share_parameters() {
        let refiner = EmbeddingRefiner::new(RefinerConfig::new(8)).unwrap();
        let left = Array2::random((2, 8), StandardNormal);
        let rights = random_sequence(3, 2, 8);

        let a = refiner.refine(&left, &rights, true, true).unwrap();
        let b = refiner.refine(&left, &rights, true, true).unwrap();

        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_rejects_width_mismatch() {
        let refiner = EmbeddingRefiner::new(RefinerConfig::new(16)).unwrap();
        let left = Array2::zeros((2, 8));
        let rights = vec![Array2::zeros((2, 16))];

        assert!(matches!(
            refiner.refine(&left, &rights, true, true),
            Err(RefinerError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_candidates() {
        let refiner = EmbeddingRefiner::new(RefinerConfig::new(16)).unwrap();
        let left = Array2::zeros((2, 16));

        assert!(matches!(
            refiner.refine(&left, &[], true, true),
            Err(RefinerError::EmptyCandidateSet)
        ));
    }

    #[test]
    fn test_odd_width_without_right_refinement() {
        // Odd widths are allowed as long as right refinement is neither
        // configured nor requested.
        let config = RefinerConfig::new(9).with_right_refinement(false);
        let refiner = EmbeddingRefiner::new(config).unwrap();

        let left = Array2::random((2, 9), StandardNormal);
        let rights = random_sequence(3, 2, 9);

        let (out_left, _) = refiner.refine(&left, &rights, true, false).unwrap();
        assert_eq!(out_left.shape(), &[2, 9]);

        // Asking for right refinement anyway is an error, not a panic
        assert!(matches!(
            refiner.refine(&left, &rights, true, true),
            Err(RefinerError::OddEmbeddingWidth(9))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let refiner = EmbeddingRefiner::new(RefinerConfig::new(8)).unwrap();
        let left = Array2::random((2, 8), StandardNormal);
        let rights = random_sequence(3, 2, 8);

        let dir = std::env::temp_dir().join("hypercolumn_refiner_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("refiner.bin");

        refiner.save(&path).unwrap();
        let loaded = EmbeddingRefiner::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let a = refiner.refine(&left, &rights, true, true).unwrap();
        let b = loaded.refine(&left, &rights, true, true).unwrap();

        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }
}
