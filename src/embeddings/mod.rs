// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Text embedding models
//!
//! The [`EmbeddingModel`] trait is the seam between the HTTP layer and the
//! model runtime. Production code uses [`OnnxEmbeddingModel`]; the handle in
//! [`handle`] owns the single process-wide instance.

pub mod handle;
pub mod hub;
pub mod onnx_model;
pub mod pooling;

pub use handle::{ModelHandle, ModelLoader};
pub use hub::{ModelFiles, ModelSource, OnnxModelLoader};
pub use onnx_model::{OnnxEmbeddingModel, OnnxOptions};
pub use pooling::{Pooling, PoolingConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by embedding models and the model handle
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The model could not be loaded (missing weights, bad files, OOM)
    #[error("Embedding model unavailable: {0}")]
    Unavailable(String),

    /// Tokenization or the forward pass failed for a request
    #[error("Embedding inference failed: {0}")]
    Inference(String),

    /// The model produced vectors of an unexpected width
    #[error("Unexpected embedding dimension: {actual} (expected {expected})")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A loaded text embedding model
///
/// Implementations must be safe to call from many requests at once.
/// Every vector returned by one instance has length [`dimension`](Self::dimension).
#[async_trait]
pub trait EmbeddingModel: Send + Sync + std::fmt::Debug {
    /// Model identifier, e.g. `sentence-transformers/all-MiniLM-L6-v2`
    fn model_name(&self) -> &str;

    /// Width of every produced vector
    fn dimension(&self) -> usize;

    /// Encodes `texts` in order, one vector per input
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;

    /// Encodes a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ModelError::Inference("model returned no vector".to_string()))
    }
}
