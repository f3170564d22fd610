// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /api/textembedding HTTP handler

use crate::api::embed::{EmbedRequest, EmbedResponse, TextInput};
use crate::api::errors::{ApiError, POST_ONLY_MESSAGE};
use crate::api::server::AppState;
use crate::embeddings::ModelError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Json,
};
use tracing::{debug, warn};

/// POST /api/textembedding handler
///
/// # Request Body
/// ```json
/// { "text": "hello world" }        // or ["a", "b"]
/// ```
///
/// # Response Body
/// ```json
/// { "numpy_data": [0.1, 0.2, ...] }  // or [[...], [...]] for a batch
/// ```
///
/// # Errors
/// - 400: body missing, not JSON, or `text` is not a string / array of strings
/// - 503: the model could not be loaded
/// - 500: inference failed
pub async fn embed_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected embedding request: {}", rejection.body_text());
        ApiError::InvalidRequest(rejection.body_text())
    })?;

    debug!(
        "Embedding request: {} text(s), batch: {}",
        request.text.count(),
        request.text.is_batch()
    );

    let model = state.model.get().await?;

    let response = match request.text {
        TextInput::Single(text) => EmbedResponse::single(model.embed(&text).await?),
        TextInput::Batch(texts) => {
            let vectors = model.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(ModelError::Inference(format!(
                    "model returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                ))
                .into());
            }
            EmbedResponse::batch(vectors)
        }
    };

    Ok(Json(response))
}

/// Any non-POST method on the embedding route
pub async fn method_not_allowed_handler() -> impl IntoResponse {
    (
        [(header::ALLOW, "POST")],
        ApiError::MethodNotAllowed(POST_ONLY_MESSAGE.to_string()),
    )
}
