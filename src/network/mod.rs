//! Core refinement components
//!
//! This module contains the numeric building blocks of the refiner:
//! - Batched LSTM cell shared by both passes
//! - Bidirectional set encoder for the candidate side
//! - Attention-refinement loop for the query side
//! - Orchestrator composing the two behind one entry point

mod attention;
mod encoder;
mod lstm;
mod observe;
mod refiner;

pub use attention::AttentionRefiner;
pub use encoder::SetEncoder;
pub use lstm::LstmCell;
pub use observe::{tensor_stats, NullObserver, RefineObserver, StepSnapshot, TensorStats};
pub use refiner::EmbeddingRefiner;
