// src/collect/providers/mod.rs
pub mod newsapi;
pub mod yahoo;

pub use newsapi::NewsApiProvider;
pub use yahoo::YahooChartProvider;

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::FetchWindow;

/// A news article as returned by a provider, before persistence.
/// `published_at` is `None` when the provider omitted or mangled the
/// timestamp; the collector decides the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArticle {
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// One OHLCV point as returned by a price provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    /// Up to `limit` articles matching `query` inside `window`,
    /// most-recent-first; ties keep provider order.
    async fn fetch(&self, query: &str, window: &FetchWindow, limit: usize)
        -> Result<Vec<RawArticle>>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    /// Price bars for `symbol` whose market timestamps fall inside `window`.
    /// An empty result is a data gap, not an error.
    async fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<RawBar>>;
    fn name(&self) -> &'static str;
}
