// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Service configuration
//!
//! Every setting is a command-line flag with an environment variable
//! fallback. `main` loads a `.env` file first, so either source works.

use crate::embeddings::OnnxOptions;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_ONNX_FILE: &str = "onnx/model.onnx";

/// When the embedding model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Load before the listener accepts connections; fail startup on error
    Eager,
    /// Load on the first embedding request
    #[default]
    Lazy,
}

/// koukitext text embedding service
#[derive(Parser, Debug, Clone)]
#[command(name = "koukitext")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Serve sentence-transformer text embeddings over HTTP", long_about = None)]
pub struct ServiceConfig {
    /// Host name or address to bind
    #[arg(long, env = "KOUKITEXT_HOST", default_value = "localhost")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "KOUKITEXT_PORT", default_value_t = 5050)]
    pub port: u16,

    /// Model identifier on the HuggingFace Hub
    #[arg(long, env = "KOUKITEXT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Load model files from this directory instead of the Hub
    #[arg(long, env = "KOUKITEXT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// ONNX graph path, relative to the model directory or repository
    #[arg(long, env = "KOUKITEXT_ONNX_FILE", default_value = DEFAULT_ONNX_FILE)]
    pub onnx_file: String,

    /// Maximum tokens per input; longer inputs are truncated.
    /// Defaults to the model's `max_seq_length` and is capped by it.
    #[arg(long, env = "KOUKITEXT_MAX_LENGTH")]
    pub max_length: Option<usize>,

    /// Eager or lazy model loading
    #[arg(long, env = "KOUKITEXT_LOAD_POLICY", value_enum, default_value_t = LoadPolicy::Lazy)]
    pub load_policy: LoadPolicy,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "KOUKITEXT_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Verbose logging (RUST_LOG still takes precedence)
    #[arg(long, env = "KOUKITEXT_DEBUG")]
    pub debug: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5050,
            model: DEFAULT_MODEL.to_string(),
            model_dir: None,
            onnx_file: DEFAULT_ONNX_FILE.to_string(),
            max_length: None,
            load_policy: LoadPolicy::Lazy,
            intra_threads: 4,
            debug: false,
        }
    }
}

impl ServiceConfig {
    /// Resolves `host:port` to the first socket address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("No address found for {}:{}", self.host, self.port))
    }

    /// Validates values clap cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            anyhow::bail!("model identifier cannot be empty");
        }
        if self.max_length == Some(0) {
            anyhow::bail!("max_length must be greater than 0");
        }
        if self.intra_threads == 0 {
            anyhow::bail!("intra_threads must be greater than 0");
        }
        Ok(())
    }

    /// Default log filter when RUST_LOG is unset
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "koukitext=debug,tower_http=debug,info"
        } else {
            "koukitext=info,tower_http=info,warn"
        }
    }

    /// Runtime options for the ONNX model
    ///
    /// Pooling and the truncation length are filled in from model metadata
    /// when the model is loaded.
    pub fn onnx_options(&self) -> OnnxOptions {
        OnnxOptions {
            intra_threads: self.intra_threads,
            ..Default::default()
        }
    }
}
