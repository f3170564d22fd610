// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod embeddings;
pub mod version;

pub use api::{create_router, ApiServer, AppState};
pub use config::{LoadPolicy, ServiceConfig};
pub use embeddings::{EmbeddingModel, ModelError, ModelHandle, ModelLoader, OnnxModelLoader};
