// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model file resolution
//!
//! A sentence-transformer repository carries, besides the ONNX graph and
//! `tokenizer.json`, small metadata files that decide how text becomes a
//! sentence vector:
//! - `1_Pooling/config.json`: which pooling mode the model was trained with
//! - `modules.json`: the pipeline; a `Normalize` module means L2 output
//! - `sentence_bert_config.json`: `max_seq_length`, the truncation length
//!
//! Files come either from a local directory or from the HuggingFace Hub.
//! Metadata files may be absent, but a Hub failure other than 404 fails the
//! load so the model is never built with guessed settings.

use crate::config::ServiceConfig;
use crate::embeddings::{
    EmbeddingModel, ModelLoader, OnnxEmbeddingModel, OnnxOptions, Pooling, PoolingConfig,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use hf_hub::api::tokio::{ApiError, ApiRepo};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TOKENIZER_FILE: &str = "tokenizer.json";
const POOLING_CONFIG_FILE: &str = "1_Pooling/config.json";
const MODULES_FILE: &str = "modules.json";
const SENTENCE_CONFIG_FILE: &str = "sentence_bert_config.json";
const NORMALIZE_MODULE: &str = "sentence_transformers.models.Normalize";

/// Organization assumed for Hub ids given without one
const DEFAULT_ORGANIZATION: &str = "sentence-transformers";

/// Where model files come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A directory laid out like the Hub repository
    Local(PathBuf),
    /// A HuggingFace Hub repository id
    Hub(String),
}

/// Local paths of everything needed to build the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub onnx: PathBuf,
    pub tokenizer: PathBuf,
    pub pooling_config: Option<PathBuf>,
    pub modules: Option<PathBuf>,
    pub sentence_config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct PoolingFile {
    #[serde(default)]
    pooling_mode_cls_token: bool,
    #[serde(default)]
    pooling_mode_mean_tokens: bool,
}

#[derive(Debug, Deserialize)]
struct ModuleEntry {
    #[serde(rename = "type")]
    module_type: String,
}

#[derive(Debug, Deserialize)]
struct SentenceConfigFile {
    max_seq_length: Option<usize>,
}

/// Expands a bare model name to `sentence-transformers/<name>`
///
/// `multi-qa-mpnet-base-dot-v1` and `sentence-transformers/multi-qa-mpnet-base-dot-v1`
/// name the same repository.
pub fn hub_repo_id(model: &str) -> String {
    if model.contains('/') {
        model.to_string()
    } else {
        format!("{}/{}", DEFAULT_ORGANIZATION, model)
    }
}

impl ModelSource {
    /// Fetches (or locates) the model files
    ///
    /// The ONNX graph and tokenizer are required; metadata files are optional.
    pub async fn resolve(&self, onnx_file: &str) -> Result<ModelFiles> {
        match self {
            ModelSource::Local(dir) => resolve_local(dir, onnx_file),
            ModelSource::Hub(repo_id) => resolve_hub(repo_id, onnx_file).await,
        }
    }
}

fn resolve_local(dir: &Path, onnx_file: &str) -> Result<ModelFiles> {
    if !dir.is_dir() {
        anyhow::bail!("Model directory not found: {}", dir.display());
    }

    let optional = |name: &str| {
        let path = dir.join(name);
        path.is_file().then_some(path)
    };

    Ok(ModelFiles {
        onnx: dir.join(onnx_file),
        tokenizer: dir.join(TOKENIZER_FILE),
        pooling_config: optional(POOLING_CONFIG_FILE),
        modules: optional(MODULES_FILE),
        sentence_config: optional(SENTENCE_CONFIG_FILE),
    })
}

async fn resolve_hub(repo_id: &str, onnx_file: &str) -> Result<ModelFiles> {
    info!("Fetching {} from the HuggingFace Hub", repo_id);

    let api = hf_hub::api::tokio::Api::new().context("Failed to create HuggingFace Hub client")?;
    let repo = api.model(repo_id.to_string());

    let onnx = repo
        .get(onnx_file)
        .await
        .with_context(|| format!("Failed to download {} from {}", onnx_file, repo_id))?;
    let tokenizer = repo
        .get(TOKENIZER_FILE)
        .await
        .with_context(|| format!("Failed to download {} from {}", TOKENIZER_FILE, repo_id))?;

    Ok(ModelFiles {
        onnx,
        tokenizer,
        pooling_config: fetch_optional(&repo, repo_id, POOLING_CONFIG_FILE).await?,
        modules: fetch_optional(&repo, repo_id, MODULES_FILE).await?,
        sentence_config: fetch_optional(&repo, repo_id, SENTENCE_CONFIG_FILE).await?,
    })
}

/// Downloads a file the repository may not have
///
/// Only a 404 means "absent". Timeouts, rate limits and server errors are
/// returned so the load fails and is retried later.
async fn fetch_optional(repo: &ApiRepo, repo_id: &str, name: &str) -> Result<Option<PathBuf>> {
    match repo.get(name).await {
        Ok(path) => Ok(Some(path)),
        Err(e) if is_not_found(&e) => {
            debug!("No {} in {}", name, repo_id);
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to download {} from {}", name, repo_id)),
    }
}

/// True when the Hub answered 404 for the file
fn is_not_found(err: &ApiError) -> bool {
    match err {
        ApiError::RequestError(e) => e.status().map(|status| status.as_u16()) == Some(404),
        _ => false,
    }
}

impl ModelFiles {
    /// Reads pooling mode and normalization from the metadata files
    ///
    /// Without `1_Pooling/config.json` the model is mean pooled. Without
    /// `modules.json` output is not normalized, as sentence-transformers
    /// builds a plain Transformer + Pooling pipeline in that case.
    pub fn pooling(&self) -> Result<PoolingConfig> {
        let mut config = PoolingConfig::default();

        if let Some(path) = &self.pooling_config {
            let file: PoolingFile = read_json(path)?;

            config.pooling = if file.pooling_mode_cls_token {
                Pooling::Cls
            } else {
                if !file.pooling_mode_mean_tokens {
                    warn!("Unsupported pooling mode in {}, using mean", path.display());
                }
                Pooling::Mean
            };
        }

        match &self.modules {
            Some(path) => {
                let modules: Vec<ModuleEntry> = read_json(path)?;
                config.normalize = modules.iter().any(|m| m.module_type == NORMALIZE_MODULE);
            }
            None => warn!(
                "No {} found; embeddings will not be normalized",
                MODULES_FILE
            ),
        }

        Ok(config)
    }

    /// `max_seq_length` from `sentence_bert_config.json`, if published
    pub fn max_seq_length(&self) -> Result<Option<usize>> {
        match &self.sentence_config {
            Some(path) => {
                let file: SentenceConfigFile = read_json(path)?;
                Ok(file.max_seq_length.filter(|&len| len > 0))
            }
            None => Ok(None),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Picks the truncation length
///
/// An explicit override wins but is capped at the model's own limit, since
/// longer sequences overrun its position embeddings.
fn effective_max_length(
    requested: Option<usize>,
    model_limit: Option<usize>,
    fallback: usize,
) -> usize {
    match (requested, model_limit) {
        (Some(requested), Some(limit)) if requested > limit => {
            warn!(
                "max_length {} exceeds the model's max_seq_length {}; using {}",
                requested, limit, limit
            );
            limit
        }
        (Some(requested), _) => requested,
        (None, Some(limit)) => limit,
        (None, None) => fallback,
    }
}

/// Loads an [`OnnxEmbeddingModel`] from a local directory or the Hub
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    model_id: String,
    source: ModelSource,
    onnx_file: String,
    options: OnnxOptions,
    max_length: Option<usize>,
}

impl OnnxModelLoader {
    pub fn new(
        model_id: impl Into<String>,
        source: ModelSource,
        onnx_file: impl Into<String>,
        options: OnnxOptions,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            source,
            onnx_file: onnx_file.into(),
            options,
            max_length: None,
        }
    }

    /// Overrides the model's `max_seq_length` (still capped by it)
    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        let model_id = hub_repo_id(&config.model);
        let source = match &config.model_dir {
            Some(dir) => ModelSource::Local(dir.clone()),
            None => ModelSource::Hub(model_id.clone()),
        };
        Self::new(
            model_id,
            source,
            config.onnx_file.clone(),
            config.onnx_options(),
        )
        .with_max_length(config.max_length)
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn load(&self) -> Result<Arc<dyn EmbeddingModel>> {
        let files = self.source.resolve(&self.onnx_file).await?;
        let mut options = self.options.clone();
        options.pooling = files.pooling()?;
        options.max_length = effective_max_length(
            self.max_length,
            files.max_seq_length()?,
            self.options.max_length,
        );

        let model_id = self.model_id.clone();
        let model = tokio::task::spawn_blocking(move || {
            OnnxEmbeddingModel::new(model_id, files.onnx, files.tokenizer, options)
        })
        .await
        .context("Model loading task panicked")??;

        Ok(Arc::new(model))
    }
}
