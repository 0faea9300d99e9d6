//! Scoring Entrypoint
//! Scores every stored article that has no sentiment yet, then computes
//! and persists the crypto-vs-economy summary for the trailing window.

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use crypto_sentiment_pipeline::config::PipelineConfig;
use crypto_sentiment_pipeline::logging;
use crypto_sentiment_pipeline::sentiment::summary::{compute_summary, persist_summary};
use crypto_sentiment_pipeline::sentiment::{LexiconModel, SentimentScorer};
use crypto_sentiment_pipeline::store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init("scorer")?;

    let cfg = PipelineConfig::load_default().context("loading pipeline config")?;
    let store = JsonFileStore::open(&cfg.data_dir).with_context(|| {
        format!("open document store at {}", cfg.data_dir.display())
    })?;

    let model = LexiconModel::new();
    let scorer = SentimentScorer::new(&store, &model);

    let now = Utc::now();
    for source in cfg.news_sources() {
        let outcome = scorer
            .analyze(&source.collection, now)
            .await
            .with_context(|| format!("scoring collection {}", source.collection))?;
        info!(
            collection = %source.collection,
            analyzed = outcome.analyzed,
            skipped = outcome.skipped,
            "collection scored"
        );
    }

    let summary = compute_summary(&store, &cfg, now)
        .await
        .context("computing sentiment summary")?;
    persist_summary(&store, &cfg.data_dir, &summary)
        .await
        .context("persisting sentiment summary")?;
    info!(
        crypto = summary.crypto_score,
        economy = summary.economy_score,
        divergence = summary.divergence,
        "summary persisted"
    );

    Ok(())
}
