//! Query Service — Binary Entrypoint
//! Boots the Axum HTTP server over the collected document store, wiring
//! routes, shared state, and the Prometheus exporter.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crypto_sentiment_pipeline::api;
use crypto_sentiment_pipeline::config::PipelineConfig;
use crypto_sentiment_pipeline::logging;
use crypto_sentiment_pipeline::metrics::Metrics;
use crypto_sentiment_pipeline::store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init("query")?;

    let cfg = Arc::new(PipelineConfig::load_default()?);
    let store = Arc::new(
        JsonFileStore::open(&cfg.data_dir).with_context(|| {
            format!("open document store at {}", cfg.data_dir.display())
        })?,
    );

    let metrics = Metrics::init(cfg.collection_interval_hours);
    let router = api::create_router(store, cfg).merge(metrics.router());

    let port: u16 = match std::env::var("PORT") {
        Ok(v) => v.parse().context("PORT must be a number")?,
        Err(_) => 8000,
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("bind port {port}"))?;
    info!(port, "query service listening");

    axum::serve(listener, router).await?;
    Ok(())
}
