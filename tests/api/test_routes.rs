// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Root, health and fallback routes

use crate::common::{handle_with, post_json, router_with, send, test_router, CountingLoader};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use koukitext::{
    api::{HealthResponse, WELCOME_MESSAGE},
    config::LoadPolicy,
};
use std::sync::Arc;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_root_returns_welcome() {
    let (status, body) = send(test_router(), get("/")).await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(!text.is_empty());
    assert_eq!(text, WELCOME_MESSAGE);
}

#[tokio::test]
async fn test_unknown_route_returns_404_json() {
    let (status, body) = send(test_router(), get("/api/nothing-here")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Not found: /api/nothing-here");
}

#[tokio::test]
async fn test_health_before_and_after_lazy_load() {
    let loader = Arc::new(CountingLoader::new());
    let handle = handle_with(loader.clone(), LoadPolicy::Lazy);
    let router = router_with(handle);

    let (status, body) = send(router.clone(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert!(!health.model_loaded);
    assert_eq!(health.dimension, None);
    assert_eq!(health.load_policy, "lazy");

    // Health checks never trigger a load
    assert_eq!(loader.calls(), 0);

    post_json(router.clone(), r#"{"text": "warm up"}"#).await;

    let (_, body) = send(router, get("/health")).await;
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert!(health.model_loaded);
    assert_eq!(health.dimension, Some(384));
    assert_eq!(health.model, "sentence-transformers/all-MiniLM-L6-v2");
}

#[tokio::test]
async fn test_health_degraded_when_eager_model_missing() {
    let handle = handle_with(Arc::new(CountingLoader::failing()), LoadPolicy::Eager);
    let _ = handle.preload().await;

    let (status, body) = send(router_with(handle), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "degraded");
    assert_eq!(health.load_policy, "eager");
}
