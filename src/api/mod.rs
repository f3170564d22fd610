// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod embed;
pub mod errors;
pub mod handlers;
pub mod server;

pub use embed::{embed_handler, EmbedRequest, EmbedResponse, EmbeddingData, TextInput};
pub use errors::{ApiError, ErrorResponse};
pub use handlers::{HealthResponse, WELCOME_MESSAGE};
pub use server::{create_router, ApiServer, AppState, EMBED_ROUTE};
