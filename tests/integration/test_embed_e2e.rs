// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end tests over a real TCP listener
//!
//! Starts `ApiServer` on an ephemeral port and talks to it with reqwest,
//! the way an external client would.

use crate::common::{handle_with, CountingLoader, TEST_DIMENSION};
use koukitext::{
    api::{ApiServer, AppState, WELCOME_MESSAGE},
    config::LoadPolicy,
};
use serde_json::{json, Value};
use std::sync::Arc;

async fn start_server(loader: Arc<CountingLoader>) -> (ApiServer, String) {
    let state = AppState::new(handle_with(loader, LoadPolicy::Lazy));
    let server = ApiServer::start("127.0.0.1:0".parse().unwrap(), state)
        .await
        .expect("Failed to start server");
    let base_url = format!("http://{}", server.local_addr());
    (server, base_url)
}

#[cfg(test)]
mod e2e_tests {
    use super::*;

    /// Test 1: Full request cycle for single and batch input
    #[tokio::test]
    async fn test_e2e_single_and_batch() {
        let loader = Arc::new(CountingLoader::new());
        let (server, base_url) = start_server(loader.clone()).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/textembedding", base_url);

        let response = client
            .post(&url)
            .json(&json!({"text": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["numpy_data"].as_array().unwrap().len(), TEST_DIMENSION);

        let response = client
            .post(&url)
            .json(&json!({"text": ["a", "b", "c"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["numpy_data"].as_array().unwrap().len(), 3);

        assert_eq!(loader.calls(), 1);
        server.shutdown().await.unwrap();
    }

    /// Test 2: Root, wrong method and bad body over the wire
    #[tokio::test]
    async fn test_e2e_root_and_errors() {
        let (server, base_url) = start_server(Arc::new(CountingLoader::new())).await;
        let client = reqwest::Client::new();

        let root = client.get(&base_url).send().await.unwrap();
        assert_eq!(root.status(), 200);
        assert_eq!(root.text().await.unwrap(), WELCOME_MESSAGE);

        let url = format!("{}/api/textembedding", base_url);
        let wrong_method = client.get(&url).send().await.unwrap();
        assert_eq!(wrong_method.status(), 405);
        let body: Value = wrong_method.json().await.unwrap();
        assert_eq!(body["error"], "Only POST requests are allowed for this endpoint");

        let bad_body = client
            .post(&url)
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(bad_body.status(), 400);

        server.shutdown().await.unwrap();
    }

    /// Test 3: Unloadable model yields 503 and the server keeps serving
    #[tokio::test]
    async fn test_e2e_model_unavailable() {
        let (server, base_url) = start_server(Arc::new(CountingLoader::failing())).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/api/textembedding", base_url))
            .json(&json!({"text": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 503);

        let root = client.get(&base_url).send().await.unwrap();
        assert_eq!(root.status(), 200);

        server.shutdown().await.unwrap();
    }
}
