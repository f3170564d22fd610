// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use koukitext::{
    api::{ApiServer, AppState, EMBED_ROUTE},
    config::{LoadPolicy, ServiceConfig},
    embeddings::{ModelHandle, OnnxModelLoader},
    version,
};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = ServiceConfig::parse();
    config.validate()?;

    // RUST_LOG wins over --debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("🚀 Starting {}...\n", version::get_version_string());

    let loader = Arc::new(OnnxModelLoader::from_config(&config));
    let handle = Arc::new(ModelHandle::new(loader, config.load_policy));

    match config.load_policy {
        LoadPolicy::Eager => {
            println!("🧠 Loading embedding model {}...", config.model);
            let model = handle
                .preload()
                .await
                .context("Failed to load embedding model")?;
            println!(
                "✅ Embedding model loaded ({} dimensions)",
                model.dimension()
            );
        }
        LoadPolicy::Lazy => {
            println!(
                "💤 Embedding model {} will load on the first request",
                config.model
            );
        }
    }

    let addr = config.bind_addr()?;
    let server = ApiServer::start(addr, AppState::new(handle)).await?;

    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("🎉 koukitext is running");
    println!("{}", separator);
    println!("Address:        http://{}", server.local_addr());
    println!("Embedding:      POST {}", EMBED_ROUTE);
    println!("Model:          {}", config.model);
    println!("Load policy:    {:?}", config.load_policy);
    println!("Features:       {}", version::FEATURES.join(", "));
    println!("{}\n", separator);

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    println!("\n🛑 Shutting down...");

    server.shutdown().await
}
