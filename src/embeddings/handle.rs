// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide embedding model handle
//!
//! The handle owns the single model instance for the process. It is created
//! at most once, either eagerly through [`ModelHandle::preload`] before the
//! server accepts connections, or lazily by the first request that calls
//! [`ModelHandle::get`]. Initialization goes through a one-time cell, so
//! concurrent first requests wait on a single load instead of racing.
//! After that, reads are lock-free and the model is never replaced.
//!
//! A failed load leaves the cell empty; the next caller tries again.

use crate::config::LoadPolicy;
use crate::embeddings::{EmbeddingModel, ModelError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Produces the model instance the first time it is needed
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Identifier of the model this loader produces
    fn model_id(&self) -> &str;

    async fn load(&self) -> anyhow::Result<Arc<dyn EmbeddingModel>>;
}

/// Shared, load-once embedding model
pub struct ModelHandle {
    loader: Arc<dyn ModelLoader>,
    policy: LoadPolicy,
    model: OnceCell<Arc<dyn EmbeddingModel>>,
    load_count: AtomicUsize,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_id", &self.loader.model_id())
            .field("policy", &self.policy)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ModelHandle {
    pub fn new(loader: Arc<dyn ModelLoader>, policy: LoadPolicy) -> Self {
        Self {
            loader,
            policy,
            model: OnceCell::new(),
            load_count: AtomicUsize::new(0),
        }
    }

    /// Returns the model, loading it first if nobody has yet
    ///
    /// # Errors
    /// `ModelError::Unavailable` if the loader fails.
    pub async fn get(&self) -> Result<Arc<dyn EmbeddingModel>, ModelError> {
        let model = self.model.get_or_try_init(|| self.load()).await?;
        Ok(model.clone())
    }

    /// Loads the model now (eager policy)
    pub async fn preload(&self) -> Result<Arc<dyn EmbeddingModel>, ModelError> {
        self.get().await
    }

    /// Returns the model only if it is already loaded
    pub fn try_get(&self) -> Option<Arc<dyn EmbeddingModel>> {
        self.model.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Number of successful loads; never exceeds 1
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn model_id(&self) -> &str {
        self.loader.model_id()
    }

    async fn load(&self) -> Result<Arc<dyn EmbeddingModel>, ModelError> {
        let model_id = self.loader.model_id().to_string();
        info!("Loading embedding model: {}", model_id);
        let start = Instant::now();

        match self.loader.load().await {
            Ok(model) => {
                self.load_count.fetch_add(1, Ordering::SeqCst);
                info!(
                    "✓ Loaded embedding model {} ({} dimensions) in {:.2}s",
                    model_id,
                    model.dimension(),
                    start.elapsed().as_secs_f64()
                );
                Ok(model)
            }
            Err(e) => {
                error!("✗ Failed to load embedding model {}: {:#}", model_id, e);
                Err(ModelError::Unavailable(format!("{:#}", e)))
            }
        }
    }
}
