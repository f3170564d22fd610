// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbedResponse type for POST /api/textembedding

use serde::{Deserialize, Serialize};

/// A single vector or a batch of vectors, serialized as a plain nested array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingData {
    Single(Vec<f32>),
    Batch(Vec<Vec<f32>>),
}

/// Response body for POST /api/textembedding
///
/// The field keeps its historical name `numpy_data`; existing clients
/// deserialize it by that name.
///
/// # Example
/// ```json
/// { "numpy_data": [0.01, -0.12, ...] }
/// { "numpy_data": [[0.01, ...], [0.33, ...]] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub numpy_data: EmbeddingData,
}

impl EmbedResponse {
    pub fn single(vector: Vec<f32>) -> Self {
        Self {
            numpy_data: EmbeddingData::Single(vector),
        }
    }

    pub fn batch(vectors: Vec<Vec<f32>>) -> Self {
        Self {
            numpy_data: EmbeddingData::Batch(vectors),
        }
    }

    /// Number of vectors in the response
    pub fn embedding_count(&self) -> usize {
        match &self.numpy_data {
            EmbeddingData::Single(_) => 1,
            EmbeddingData::Batch(vectors) => vectors.len(),
        }
    }

    /// Width of the vectors, `None` for an empty batch
    pub fn dimension(&self) -> Option<usize> {
        match &self.numpy_data {
            EmbeddingData::Single(vector) => Some(vector.len()),
            EmbeddingData::Batch(vectors) => vectors.first().map(Vec::len),
        }
    }
}
