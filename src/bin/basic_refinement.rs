//! Basic refinement example
//!
//! Builds synthetic hypercolumn embeddings, refines both sides, and prints
//! the resulting shapes. Mirrors the typical call the matching pipeline
//! makes per query point.

use hypercolumn_refiner::{EmbeddingRefiner, RefinerConfig};
use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand_distr::StandardNormal;

fn main() -> hypercolumn_refiner::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Hypercolumn Refiner - Basic Example ===\n");

    let embedding_dimensions = 32;
    let batch_size = 4;
    let num_candidates = 10;

    let config = RefinerConfig::new(embedding_dimensions);
    println!("Configuration:");
    println!("  Embedding width: {}", config.embedding_dimensions);
    println!("  Refinement steps: {}", config.num_refinement_steps);
    println!();

    let refiner = EmbeddingRefiner::new(config)?;

    // Synthetic inputs: one query batch, L candidate batches along the
    // epipolar line
    let left = Array2::random((batch_size, embedding_dimensions), StandardNormal);
    let rights: Vec<Array2<f64>> = (0..num_candidates)
        .map(|_| Array2::random((batch_size, embedding_dimensions), StandardNormal))
        .collect();

    println!("Inputs:");
    println!("  Left:  {:?}", left.shape());
    println!("  Right: {} x {:?}", rights.len(), rights[0].shape());
    println!();

    let (refined_left, refined_rights) = refiner.refine(&left, &rights, true, true)?;

    println!("Refined:");
    println!("  Left:  {:?}", refined_left.shape());
    println!(
        "  Right: {} x {:?}",
        refined_rights.len(),
        refined_rights[0].shape()
    );

    Ok(())
}
