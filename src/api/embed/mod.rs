// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding API Module
//!
//! Provides the POST /api/textembedding endpoint.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{embed_handler, method_not_allowed_handler};
pub use request::{EmbedRequest, TextInput};
pub use response::{EmbedResponse, EmbeddingData};
