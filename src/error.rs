//! Error types for the hypercolumn refiner

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, RefinerError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum RefinerError {
    /// Invalid configuration detected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Batch size or embedding width disagreement between inputs
    #[error("Shape mismatch: expected [{expected_batch}, {expected_dim}], found [{found_batch}, {found_dim}] ({context})")]
    ShapeMismatch {
        expected_batch: usize,
        expected_dim: usize,
        found_batch: usize,
        found_dim: usize,
        context: &'static str,
    },

    /// Candidate sequence is empty (both encoding and attention require L >= 1)
    #[error("Empty candidate sequence: at least one candidate embedding is required")]
    EmptyCandidateSet,

    /// Embedding width must be even to split between forward/backward encoders
    #[error("Embedding width {0} is odd: bidirectional encoding requires an even width")]
    OddEmbeddingWidth(usize),

    /// IO error while saving or loading parameters
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parameter serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl RefinerError {
    /// Build a shape-mismatch error from two `(batch, dim)` shapes.
    pub(crate) fn shape(
        expected: (usize, usize),
        found: (usize, usize),
        context: &'static str,
    ) -> Self {
        Self::ShapeMismatch {
            expected_batch: expected.0,
            expected_dim: expected.1,
            found_batch: found.0,
            found_dim: found.1,
            context,
        }
    }
}
