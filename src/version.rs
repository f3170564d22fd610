// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the koukitext embedding service

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "single-text-embedding",
    "batch-embedding",
    "lazy-model-loading",
    "eager-model-loading",
    "huggingface-hub-download",
    "onnx-runtime",
    "cuda-fallback-cpu",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("koukitext {}", VERSION_NUMBER)
}
