//! Configuration for the embedding refiner

use serde::{Deserialize, Serialize};

use crate::error::{RefinerError, Result};

/// Configuration of the embedding refiner
///
/// Fixed at construction time; the call-time `refine_left`/`refine_right`
/// arguments of [`crate::EmbeddingRefiner::refine`] decide what an individual
/// call actually computes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinerConfig {
    /// Width of every embedding vector
    pub embedding_dimensions: usize,
    /// Number of attention-refinement iterations for the query side
    pub num_refinement_steps: usize,
    /// Whether query (left) refinement is part of this configuration
    pub use_left_refinement: bool,
    /// Whether candidate (right) refinement is part of this configuration
    pub use_right_refinement: bool,
}

impl RefinerConfig {
    /// Create a configuration with the default number of refinement steps
    ///
    /// # Example
    /// ```
    /// use hypercolumn_refiner::RefinerConfig;
    ///
    /// let config = RefinerConfig::new(32);
    /// assert_eq!(config.num_refinement_steps, 5);
    /// ```
    pub fn new(embedding_dimensions: usize) -> Self {
        Self {
            embedding_dimensions,
            num_refinement_steps: 5,
            use_left_refinement: true,
            use_right_refinement: true,
        }
    }

    /// Set the number of refinement steps
    pub fn with_refinement_steps(mut self, num_steps: usize) -> Self {
        self.num_refinement_steps = num_steps;
        self
    }

    /// Enable or disable query-side refinement
    pub fn with_left_refinement(mut self, enabled: bool) -> Self {
        self.use_left_refinement = enabled;
        self
    }

    /// Enable or disable candidate-side refinement
    pub fn with_right_refinement(mut self, enabled: bool) -> Self {
        self.use_right_refinement = enabled;
        self
    }

    /// Validate the configuration
    ///
    /// Rejects zero widths, zero refinement steps, and an odd embedding width
    /// when right refinement is configured (the bidirectional encoder splits
    /// the width evenly between its two directions).
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimensions == 0 {
            return Err(RefinerError::InvalidConfig(
                "embedding_dimensions must be positive".to_string(),
            ));
        }
        if self.num_refinement_steps == 0 {
            return Err(RefinerError::InvalidConfig(
                "num_refinement_steps must be at least 1".to_string(),
            ));
        }
        if self.use_right_refinement && self.embedding_dimensions % 2 != 0 {
            return Err(RefinerError::OddEmbeddingWidth(self.embedding_dimensions));
        }
        Ok(())
    }
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self::new(128)
    }
}
