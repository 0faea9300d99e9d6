// src/sentiment/summary.rs
//! Crypto-vs-economy comparison cycle: mean sentiment over each side's
//! news collections within a trailing window, divergence = crypto − economy.
//! One summary is appended to the `sentiment_results` collection per cycle
//! and mirrored to a timestamped JSON file for quick inspection.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::path::Path;
use tracing::info;

use crate::config::{NewsTopic, PipelineConfig};
use crate::store::DocumentStore;
use crate::types::SentimentSummary;

pub const SUMMARY_COLLECTION: &str = "sentiment_results";

/// With no scored articles on a side, the side reports neutral.
const NEUTRAL_SCORE: f64 = 0.5;

/// Mean score and article count over one side's collections in
/// `[now - window, now]` (by publication time).
async fn side_average(
    store: &dyn DocumentStore,
    collections: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(f64, usize)> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for collection in collections {
        let docs = store
            .query_range(collection, "published_at", start, end)
            .await?;
        for doc in docs {
            if let Some(score) = doc
                .get("sentiment")
                .and_then(|s| s.get("score"))
                .and_then(|v| v.as_f64())
            {
                sum += score;
                count += 1;
            }
        }
    }
    if count == 0 {
        return Ok((NEUTRAL_SCORE, 0));
    }
    Ok((sum / count as f64, count))
}

pub async fn compute_summary(
    store: &dyn DocumentStore,
    cfg: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<SentimentSummary> {
    let start = now - Duration::hours(cfg.summary_window_hours);

    let crypto_cols = cfg.news_collections(NewsTopic::Crypto);
    let economy_cols = cfg.news_collections(NewsTopic::Economy);

    let (crypto_score, crypto_articles) = side_average(store, &crypto_cols, start, now).await?;
    let (economy_score, economy_articles) = side_average(store, &economy_cols, start, now).await?;

    Ok(SentimentSummary {
        computed_at: now,
        crypto_score,
        economy_score,
        divergence: crypto_score - economy_score,
        crypto_articles,
        economy_articles,
    })
}

/// Append the summary to the store and write its JSON mirror file under
/// the data directory. Historical summaries are never rewritten; the
/// computed_at key makes a re-run of the same instant a no-op.
pub async fn persist_summary(
    store: &dyn DocumentStore,
    data_dir: &Path,
    summary: &SentimentSummary,
) -> Result<()> {
    let key = summary.computed_at.to_rfc3339();
    store
        .insert_if_absent(SUMMARY_COLLECTION, &key, json!(summary))
        .await?;

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let path = data_dir.join(format!(
        "sentiment-{}.json",
        summary.computed_at.format("%Y%m%d-%H%M%S")
    ));
    let body = serde_json::to_vec_pretty(summary).context("serializing summary")?;
    std::fs::write(&path, body)
        .with_context(|| format!("writing summary file {}", path.display()))?;

    info!(
        crypto = summary.crypto_score,
        economy = summary.economy_score,
        divergence = summary.divergence,
        file = %path.display(),
        "sentiment summary persisted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use chrono::TimeZone;

    fn scored_doc(published: &str, score: f64) -> serde_json::Value {
        json!({
            "title": "t",
            "published_at": published,
            "sentiment": {"score": score, "label": "neutral", "scored_at": published}
        })
    }

    #[tokio::test]
    async fn divergence_is_crypto_minus_economy() {
        let cfg = PipelineConfig::default_seed();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let store = MemStore::new();

        store
            .insert_if_absent(
                "bitcoin_articles",
                "a",
                scored_doc("2024-05-01T12:00:00Z", 0.8),
            )
            .await
            .unwrap();
        store
            .insert_if_absent(
                "bitcoin_articles",
                "b",
                scored_doc("2024-05-01T13:00:00Z", 0.6),
            )
            .await
            .unwrap();
        store
            .insert_if_absent(
                "global_economy_articles",
                "c",
                scored_doc("2024-05-01T12:00:00Z", 0.4),
            )
            .await
            .unwrap();

        let s = compute_summary(&store, &cfg, now).await.unwrap();
        assert!((s.crypto_score - 0.7).abs() < 1e-9);
        assert!((s.economy_score - 0.4).abs() < 1e-9);
        assert!((s.divergence - 0.3).abs() < 1e-9);
        assert_eq!((s.crypto_articles, s.economy_articles), (2, 1));
    }

    #[tokio::test]
    async fn empty_side_reports_neutral_with_zero_count() {
        let cfg = PipelineConfig::default_seed();
        let store = MemStore::new();
        let s = compute_summary(&store, &cfg, Utc::now()).await.unwrap();
        assert_eq!(s.crypto_score, 0.5);
        assert_eq!(s.economy_score, 0.5);
        assert_eq!(s.divergence, 0.0);
        assert_eq!((s.crypto_articles, s.economy_articles), (0, 0));
    }

    #[tokio::test]
    async fn unscored_articles_do_not_count() {
        let cfg = PipelineConfig::default_seed();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let store = MemStore::new();
        store
            .insert_if_absent(
                "bitcoin_articles",
                "a",
                json!({"title": "t", "published_at": "2024-05-01T12:00:00Z"}),
            )
            .await
            .unwrap();
        let s = compute_summary(&store, &cfg, now).await.unwrap();
        assert_eq!(s.crypto_articles, 0);
    }

    #[tokio::test]
    async fn persist_writes_store_record_and_mirror_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemStore::new();
        let summary = SentimentSummary {
            computed_at: Utc.with_ymd_and_hms(2024, 5, 2, 3, 4, 5).unwrap(),
            crypto_score: 0.7,
            economy_score: 0.5,
            divergence: 0.2,
            crypto_articles: 3,
            economy_articles: 2,
        };
        persist_summary(&store, dir.path(), &summary).await.unwrap();

        assert_eq!(store.len(SUMMARY_COLLECTION), 1);
        let file = dir.path().join("sentiment-20240502-030405.json");
        let body = std::fs::read_to_string(file).unwrap();
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["divergence"], 0.2);

        // Re-persisting the same cycle is a no-op in the store.
        persist_summary(&store, dir.path(), &summary).await.unwrap();
        assert_eq!(store.len(SUMMARY_COLLECTION), 1);
    }
}
