// src/sentiment/mod.rs
//! # Sentiment Scoring
//! Selects persisted articles that have no sentiment yet, scores them
//! sentence by sentence through the model seam, and writes the result back
//! exactly once. Scoring is pure (`text -> sentence scores -> aggregate`);
//! persistence is a separate step so the policy pieces stay testable.

pub mod model;
pub mod summary;

pub use model::{LexiconModel, SentimentModel};

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde_json::json;
use tracing::{debug, warn};

use crate::store::DocumentStore;
use crate::types::{Article, Sentiment, SentimentLabel};

/// Upper bound on articles scored per collection per invocation; the next
/// scheduled run picks up the remainder.
const MAX_BATCH: usize = 100;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("score_articles_total", "Articles scored and persisted.");
        describe_counter!(
            "score_skipped_total",
            "Unscored articles skipped (empty or raced)."
        );
        describe_gauge!("score_last_run_ts", "Unix ts when scoring last ran.");
    });
}

/// Split text into sentence units: any run of terminal punctuation ends a
/// sentence, whitespace-only fragments are discarded.
pub fn split_sentences(text: &str) -> Vec<String> {
    static RE_TERM: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_TERM.get_or_init(|| regex::Regex::new(r"[.!?…]+").unwrap());
    re.split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Aggregation policy over sentence scores. Mean is the documented
/// default; the parameter exists because this is a policy choice, not a
/// property of the pipeline.
pub type Aggregate = fn(&[f64]) -> f64;

pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Score one document. `None` means the text had no scoreable sentences
/// (the caller skips the article rather than recording a zero). Sentences
/// the model rejects are dropped with a warning, matching the per-source
/// isolation rule: one bad sentence never sinks the document.
pub fn score_document(model: &dyn SentimentModel, text: &str, agg: Aggregate) -> Option<f64> {
    let sentences = split_sentences(text);
    let mut scores = Vec::with_capacity(sentences.len());
    for sentence in &sentences {
        match model.score_sentence(sentence) {
            Ok(s) => scores.push(s),
            Err(e) => warn!(error = ?e, "model failed on sentence, dropping it"),
        }
    }
    if scores.is_empty() {
        return None;
    }
    Some(agg(&scores))
}

/// Score-to-label boundaries: `< 0.4` negative, `[0.4, 0.6]` neutral,
/// `> 0.6` positive.
pub fn classify(score: f64) -> SentimentLabel {
    if score < 0.4 {
        SentimentLabel::Negative
    } else if score > 0.6 {
        SentimentLabel::Positive
    } else {
        SentimentLabel::Neutral
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzeOutcome {
    pub analyzed: usize,
    pub skipped: usize,
}

pub struct SentimentScorer<'a> {
    store: &'a dyn DocumentStore,
    model: &'a dyn SentimentModel,
    aggregate: Aggregate,
}

impl<'a> SentimentScorer<'a> {
    pub fn new(store: &'a dyn DocumentStore, model: &'a dyn SentimentModel) -> Self {
        Self {
            store,
            model,
            aggregate: mean,
        }
    }

    /// Replace the aggregation policy (default: arithmetic mean).
    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Score every article in `collection` that has no sentiment yet.
    /// Selection is the store's "field absent" query, so a repeated or
    /// concurrent invocation finds nothing left to score and existing
    /// results are never overwritten.
    pub async fn analyze(&self, collection: &str, now: DateTime<Utc>) -> Result<AnalyzeOutcome> {
        ensure_metrics_described();

        let pending = self
            .store
            .find_missing(collection, "sentiment", MAX_BATCH)
            .await?;
        debug!(collection, pending = pending.len(), "unscored articles selected");

        let mut outcome = AnalyzeOutcome::default();
        for (key, doc) in pending {
            let article: Article = match serde_json::from_value(doc) {
                Ok(a) => a,
                Err(e) => {
                    warn!(collection, key = %key, error = ?e, "skipping malformed article document");
                    outcome.skipped += 1;
                    continue;
                }
            };

            let text = crate::collect::normalize_text(&format!(
                "{}. {}",
                article.title, article.content
            ));
            let Some(score) = score_document(self.model, &text, self.aggregate) else {
                warn!(collection, key = %key, title = %article.title, "no scoreable sentences, article skipped");
                outcome.skipped += 1;
                continue;
            };

            let sentiment = Sentiment {
                score,
                label: classify(score),
                scored_at: now,
            };
            let wrote = self
                .store
                .update_if_missing(collection, &key, "sentiment", json!(sentiment))
                .await?;
            if wrote {
                outcome.analyzed += 1;
            } else {
                // Raced with another scorer; the earlier result stands.
                debug!(collection, key = %key, "article already scored, leaving it untouched");
                outcome.skipped += 1;
            }
        }

        counter!("score_articles_total").increment(outcome.analyzed as u64);
        counter!("score_skipped_total").increment(outcome.skipped as u64);
        gauge!("score_last_run_ts").set(now.timestamp() as f64);
        Ok(outcome)
    }
}
