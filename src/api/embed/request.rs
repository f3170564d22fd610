// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbedRequest type for POST /api/textembedding

use serde::{Deserialize, Serialize};

/// The `text` field: one string or a batch of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Single(String),
    Batch(Vec<String>),
}

/// Request body for POST /api/textembedding
///
/// # Example
/// ```json
/// { "text": "Hello world" }
/// { "text": ["Hello world", "Another text"] }
/// ```
///
/// Content is not validated: empty strings are embedded like any other text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub text: TextInput,
}

impl TextInput {
    pub fn is_batch(&self) -> bool {
        matches!(self, TextInput::Batch(_))
    }

    /// Number of texts to embed
    pub fn count(&self) -> usize {
        match self {
            TextInput::Single(_) => 1,
            TextInput::Batch(texts) => texts.len(),
        }
    }
}
