//! # Hypercolumn Refiner
//!
//! Context-aware refinement of point-feature embeddings for cross-image
//! correspondence matching. Given one query embedding (a left-image
//! hypercolumn) and an ordered set of candidate embeddings (right-image
//! hypercolumns, e.g. sampled along an epipolar line), the refiner produces
//! versions of both that have seen their context:
//!
//! - the candidate set is passed through a **bidirectional recurrent
//!   encoder** so that each element absorbs information from the whole set;
//! - the query is passed through a **fixed-depth attention loop** that
//!   repeatedly re-attends over the encoded candidates and accumulates the
//!   evidence into a recurrent state, residually combined with the query.
//!
//! ## Quick Start
//!
//! ```
//! use hypercolumn_refiner::{EmbeddingRefiner, RefinerConfig};
//! use ndarray::Array2;
//!
//! # fn main() -> hypercolumn_refiner::Result<()> {
//! let refiner = EmbeddingRefiner::new(RefinerConfig::new(32))?;
//!
//! // One query batch and ten candidate batches of shape [batch, 32]
//! let left = Array2::zeros((4, 32));
//! let rights: Vec<Array2<f64>> = (0..10).map(|_| Array2::zeros((4, 32))).collect();
//!
//! let (refined_left, refined_rights) = refiner.refine(&left, &rights, true, true)?;
//! assert_eq!(refined_left.shape(), &[4, 32]);
//! assert_eq!(refined_rights.len(), 10);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`network`]: recurrent cell, set encoder, attention loop, orchestrator
//! - [`config`]: construction-time configuration
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod network;

// Re-export main types for convenience
pub use config::RefinerConfig;
pub use error::{RefinerError, Result};
pub use network::{
    AttentionRefiner,
    EmbeddingRefiner,
    LstmCell,
    NullObserver,
    RefineObserver,
    SetEncoder,
    StepSnapshot,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
