// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared fixtures: a deterministic fake model and a counting loader

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use koukitext::{
    api::{create_router, AppState},
    config::LoadPolicy,
    embeddings::{EmbeddingModel, ModelError, ModelHandle, ModelLoader},
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Same width as the default MiniLM model
pub const TEST_DIMENSION: usize = 384;
pub const TEST_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Deterministic pseudo-embeddings seeded from a hash of the text
#[derive(Debug)]
pub struct HashedModel {
    dimension: usize,
}

impl HashedModel {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            // Linear congruential generator
            seed = (seed.wrapping_mul(1664525).wrapping_add(1013904223)) ^ (i as u64);
            let value = (seed as f64 / u64::MAX as f64) * 2.0 - 1.0;
            embedding.push(value as f32);
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingModel for HashedModel {
    fn model_name(&self) -> &str {
        TEST_MODEL_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }
}

/// Loader that counts invocations and can be slowed down or made to fail
pub struct CountingLoader {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for CountingLoader {
    fn model_id(&self) -> &str {
        TEST_MODEL_ID
    }

    async fn load(&self) -> anyhow::Result<Arc<dyn EmbeddingModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("model weights not found");
        }
        Ok(Arc::new(HashedModel::new(TEST_DIMENSION)))
    }
}

pub fn handle_with(loader: Arc<CountingLoader>, policy: LoadPolicy) -> Arc<ModelHandle> {
    Arc::new(ModelHandle::new(loader, policy))
}

pub fn router_with(handle: Arc<ModelHandle>) -> Router {
    create_router(AppState::new(handle))
}

/// Router over a lazily loaded fake model
pub fn test_router() -> Router {
    router_with(handle_with(Arc::new(CountingLoader::new()), LoadPolicy::Lazy))
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

pub async fn post_json(router: Router, body: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/textembedding")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, bytes) = send(router, request).await;
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Extracts `numpy_data` as a flat vector
pub fn as_vector(value: &serde_json::Value) -> Vec<f32> {
    value
        .as_array()
        .expect("expected an array")
        .iter()
        .map(|v| v.as_f64().expect("expected a number") as f32)
        .collect()
}
