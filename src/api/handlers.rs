// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::api::errors::ApiError;
use crate::api::server::AppState;
use crate::config::LoadPolicy;
use axum::{extract::State, http::Uri, Json};
use serde::{Deserialize, Serialize};

pub const WELCOME_MESSAGE: &str = "Welcome to koukitext!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    pub load_policy: String,
    pub version: String,
}

pub async fn root_handler() -> &'static str {
    WELCOME_MESSAGE
}

/// Reports whether the model is loaded without triggering a load
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let loaded = state.model.try_get();

    // A lazy service is healthy before its first request; an eager one is not
    let status = match (&loaded, state.model.policy()) {
        (Some(_), _) | (None, LoadPolicy::Lazy) => "healthy",
        (None, LoadPolicy::Eager) => "degraded",
    };

    let load_policy = match state.model.policy() {
        LoadPolicy::Eager => "eager",
        LoadPolicy::Lazy => "lazy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        model: state.model.model_id().to_string(),
        model_loaded: loaded.is_some(),
        dimension: loaded.map(|model| model.dimension()),
        load_policy: load_policy.to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
    })
}

pub async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
