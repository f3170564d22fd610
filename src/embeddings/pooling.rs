// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sentence pooling over token embeddings
//!
//! Sentence-transformer ONNX exports return token-level hidden states
//! `[batch, seq_len, hidden]`. The sentence vector is produced here, after
//! the forward pass, following the model's sentence-transformers pooling config.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// How token embeddings are reduced to a single sentence vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Attention-mask weighted average of all tokens
    #[default]
    Mean,
    /// Hidden state of the first ([CLS]) token
    Cls,
}

/// Pooling settings discovered for a model
///
/// The default is mean pooling without normalization, the pipeline
/// sentence-transformers builds when a model ships no `modules.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolingConfig {
    pub pooling: Pooling,
    /// Apply L2 normalization after pooling
    pub normalize: bool,
}

impl PoolingConfig {
    /// Reduces one sequence `[seq_len, hidden]` to a sentence vector
    ///
    /// `mask` holds the attention mask for the same sequence; padding
    /// positions (mask 0) never contribute to mean pooling.
    pub fn apply(&self, tokens: ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
        let mut pooled = match self.pooling {
            Pooling::Mean => mean_pool(tokens, mask),
            Pooling::Cls => cls_pool(tokens),
        };

        if self.normalize {
            l2_normalize(&mut pooled);
        }

        pooled
    }
}

/// Mean pooling weighted by the attention mask
pub fn mean_pool(tokens: ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    let seq_len = tokens.shape()[0];
    let hidden_dim = tokens.shape()[1];

    let mut pooled = vec![0.0f32; hidden_dim];
    let mut sum_mask = 0.0f32;

    for i in 0..seq_len {
        let mask_value = mask.get(i).copied().unwrap_or(0) as f32;
        if mask_value == 0.0 {
            continue;
        }
        sum_mask += mask_value;
        for (j, value) in pooled.iter_mut().enumerate() {
            *value += tokens[[i, j]] * mask_value;
        }
    }

    // Avoid division by zero for fully masked rows
    let denom = sum_mask.max(1e-9);
    for value in &mut pooled {
        *value /= denom;
    }

    pooled
}

/// Takes the first token's hidden state
pub fn cls_pool(tokens: ArrayView2<'_, f32>) -> Vec<f32> {
    if tokens.shape()[0] == 0 {
        return vec![0.0; tokens.shape()[1]];
    }
    tokens.row(0).to_vec()
}

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
