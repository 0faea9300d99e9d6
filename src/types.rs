// src/types.rs
// Persisted document shapes and the per-run outcome report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Three-way sentiment classification of a scored article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

/// Sentiment result attached to an article exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sentiment {
    /// Document score in [0,1]; 0 = negative, 1 = positive.
    pub score: f64,
    pub label: SentimentLabel,
    /// Wall-clock time of the scoring write.
    pub scored_at: DateTime<Utc>,
}

/// A collected news article. Immutable after insert except for `sentiment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub source_id: String,
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    /// Provider-supplied publication time, stored verbatim.
    pub published_at: DateTime<Utc>,
    /// When the pipeline first saw this article.
    pub stored_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl Article {
    /// Stable dedup key: the URL when present, otherwise normalized title
    /// plus publication time. Hashed so it is safe as a document key.
    pub fn dedup_key(&self) -> String {
        match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => hash_key(&[self.source_id.as_str(), "url", url]),
            None => {
                let title = normalize_title(&self.title);
                let ts = self.published_at.timestamp().to_string();
                hash_key(&[self.source_id.as_str(), "title", &title, &ts])
            }
        }
    }
}

/// One OHLCV bar for an asset or index. Immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub source_id: String,
    pub symbol: String,
    /// Market timestamp of the bar, stored verbatim.
    pub timestamp: DateTime<Utc>,
    /// When the pipeline collected this bar.
    pub collection_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Dedup key over `(symbol, timestamp)`.
    pub fn dedup_key(&self) -> String {
        let ts = self.timestamp.timestamp().to_string();
        hash_key(&[self.source_id.as_str(), self.symbol.as_str(), &ts])
    }
}

/// One crypto-vs-economy comparison cycle; appended, never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub computed_at: DateTime<Utc>,
    pub crypto_score: f64,
    pub economy_score: f64,
    /// `crypto_score - economy_score`.
    pub divergence: f64,
    pub crypto_articles: usize,
    pub economy_articles: usize,
}

/// Outcome of collecting one source: how much was new, how much was
/// already known, and which fetch/storage failures occurred.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionOutcome {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl CollectionOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

fn hash_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn normalize_title(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
