// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Runs a sentence-transformer exported to ONNX (all-MiniLM-L6-v2 by default)
//! through ONNX Runtime.
//!
//! Features:
//! - ONNX model loading from disk
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - Tokenization with truncation to the model's max sequence length
//! - Batch inference with right padding
//! - Mean or CLS pooling, optional L2 normalization
//! - Output dimension discovered from the model at load time

use crate::embeddings::{EmbeddingModel, ModelError, PoolingConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::{Array3, Axis};
use ort::ep;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

const TOKEN_TYPE_IDS: &str = "token_type_ids";

/// Truncation length for models that publish no `max_seq_length`
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Runtime options for an ONNX embedding model
#[derive(Debug, Clone)]
pub struct OnnxOptions {
    /// Inputs longer than this many tokens are truncated
    pub max_length: usize,
    /// ONNX Runtime intra-op thread count
    pub intra_threads: usize,
    pub pooling: PoolingConfig,
}

impl Default for OnnxOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            intra_threads: 4,
            pooling: PoolingConfig::default(),
        }
    }
}

/// ONNX-based sentence embedding model
///
/// The session needs exclusive access to run, so inference calls are
/// serialized behind a mutex. The tokenizer is shared read-only.
/// All fields are wrapped in Arc for cheap cloning onto the blocking pool.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    session: Arc<Mutex<Session>>,

    tokenizer: Arc<Tokenizer>,

    model_name: String,

    /// Hidden size reported by the model's output tensor
    dimension: usize,

    /// Whether the graph declares a `token_type_ids` input (BERT does, MPNet doesn't)
    uses_token_type_ids: bool,

    pooling: PoolingConfig,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("uses_token_type_ids", &self.uses_token_type_ids)
            .field("pooling", &self.pooling)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Creates a new ONNX embedding model from disk paths
    ///
    /// This is blocking and expensive: it builds the runtime session and runs
    /// one validation inference to discover the output dimension.
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - ONNX Runtime initialization fails
    /// - Model output is not shaped `[batch, seq_len, hidden]`
    pub fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
        options: OnnxOptions,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        let mut session = build_session(model_path, options.intra_threads)?;

        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == TOKEN_TYPE_IDS);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: options.max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        // Validation inference; also tells us the hidden size
        let encoding = tokenizer
            .encode("validation test", true)
            .map_err(|e| anyhow::anyhow!("Tokenizer validation failed: {}", e))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let seq_len = ids.len();
        let hidden = run_session(&mut session, uses_token_type_ids, 1, seq_len, ids, mask)
            .context("Validation inference failed")?;
        let dimension = hidden.shape()[2];
        if dimension == 0 {
            anyhow::bail!("Model reports a zero-width hidden state");
        }

        info!(
            "✅ ONNX embedding model {} ready ({} dimensions, token_type_ids: {}, pooling: {:?})",
            model_name, dimension, uses_token_type_ids, options.pooling
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension,
            uses_token_type_ids,
            pooling: options.pooling,
        })
    }

    /// Blocking batch inference
    ///
    /// Tokenizes all texts, pads to the longest sequence, runs a single
    /// forward pass and pools each row.
    pub fn embed_batch_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings: Vec<_> = texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let padding = max_len - ids.len();

            input_ids.extend(ids.iter().map(|&id| id as i64));
            input_ids.extend(std::iter::repeat(0i64).take(padding));

            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
            attention_mask.extend(std::iter::repeat(0i64).take(padding));
        }

        let mask_for_pooling = attention_mask.clone();

        let hidden = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("ONNX session mutex poisoned"))?;
            run_session(
                &mut session,
                self.uses_token_type_ids,
                texts.len(),
                max_len,
                input_ids,
                attention_mask,
            )?
        };

        let embeddings: Vec<Vec<f32>> = hidden
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(row, tokens)| {
                let mask = &mask_for_pooling[row * max_len..(row + 1) * max_len];
                self.pooling.apply(tokens, mask)
            })
            .collect();

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                anyhow::bail!(ModelError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingModel for OnnxEmbeddingModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        debug!("Encoding batch of {} texts", texts.len());

        let model = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed_batch_blocking(&texts))
            .await
            .map_err(|e| ModelError::Inference(format!("inference task failed: {}", e)))?
            .map_err(|e| match e.downcast::<ModelError>() {
                Ok(model_error) => model_error,
                Err(e) => ModelError::Inference(format!("{:#}", e)),
            })
    }
}

/// Builds a session, trying CUDA first and falling back to CPU
fn build_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    info!("🚀 Initializing ONNX session from {}", model_path.display());

    match commit_session(model_path, intra_threads, ep::CUDA::default().build()) {
        Ok(session) => {
            info!("✅ CUDA execution provider initialized");
            Ok(session)
        }
        Err(e) => {
            warn!("⚠️  CUDA execution provider failed: {}", e);
            warn!("   Falling back to CPU execution provider");
            commit_session(model_path, intra_threads, ep::CPU::default().build()).with_context(
                || format!("Failed to load ONNX model from {}", model_path.display()),
            )
        }
    }
}

fn commit_session(
    model_path: &Path,
    intra_threads: usize,
    provider: ep::ExecutionProviderDispatch,
) -> ort::Result<Session> {
    Session::builder()?
        .with_execution_providers([provider])?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)
}

/// Runs one forward pass and returns owned token embeddings `[batch, seq_len, hidden]`
fn run_session(
    session: &mut Session,
    uses_token_type_ids: bool,
    batch: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
) -> Result<Array3<f32>> {
    let shape = [batch, seq_len];
    let input_ids =
        Tensor::from_array((shape, input_ids)).context("Failed to create input_ids tensor")?;
    let attention_mask = Tensor::from_array((shape, attention_mask))
        .context("Failed to create attention_mask tensor")?;

    let outputs = if uses_token_type_ids {
        let token_type_ids = Tensor::from_array((shape, vec![0i64; batch * seq_len]))
            .context("Failed to create token_type_ids tensor")?;
        session.run(ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            TOKEN_TYPE_IDS => token_type_ids
        ])?
    } else {
        session.run(ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask
        ])?
    };

    // Index [0] rather than a name: exports disagree on the output name
    let (output_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .context("Failed to extract output tensor")?;

    let dims: Vec<usize> = output_shape.iter().map(|&d| d.max(0) as usize).collect();
    match dims.as_slice() {
        &[b, s, hidden] if b == batch && s == seq_len => {
            Array3::from_shape_vec((b, s, hidden), data.to_vec())
                .context("Output tensor does not match its shape")
        }
        _ => anyhow::bail!(
            "Model outputs unexpected dimensions: {:?} (expected [{}, {}, hidden])",
            dims,
            batch,
            seq_len
        ),
    }
}
