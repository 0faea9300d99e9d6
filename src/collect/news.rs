// src/collect/news.rs
//! News collection for one source: delay-window fetch, dedup, idempotent
//! persist. Provider trouble lands in the outcome's `errors`, never in a
//! panic or an early return — other sources in the run must still proceed.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, warn};

use super::providers::NewsProvider;
use super::FetchWindow;
use crate::config::{PipelineConfig, SourceConfig};
use crate::store::DocumentStore;
use crate::types::{Article, CollectionOutcome};

/// A publication lag beyond this is suspicious enough to log.
const LAG_WARN_HOURS: i64 = 48;

pub struct NewsCollector<'a> {
    store: &'a dyn DocumentStore,
    provider: &'a dyn NewsProvider,
}

impl<'a> NewsCollector<'a> {
    pub fn new(store: &'a dyn DocumentStore, provider: &'a dyn NewsProvider) -> Self {
        Self { store, provider }
    }

    pub async fn collect(
        &self,
        source: &SourceConfig,
        cfg: &PipelineConfig,
        now: DateTime<Utc>,
    ) -> CollectionOutcome {
        let mut outcome = CollectionOutcome::default();

        // An empty collection means this source never ran; widen the first
        // window to the full default delay so bootstrap history is caught.
        let first_run = match self.store.is_empty(&source.collection).await {
            Ok(v) => v,
            Err(e) => {
                warn!(source = %source.name, error = ?e, "store probe failed");
                outcome.errors.push(format!("{}: store: {e:#}", source.name));
                return outcome;
            }
        };
        let span_hours = if first_run {
            cfg.default_delay_hours
        } else {
            cfg.collection_interval_hours
        };
        let window = FetchWindow::for_run(now, cfg.delay_hours_for(source), span_hours);
        let limit = cfg.articles_per_query_for(source);
        debug!(
            source = %source.name,
            start = %window.start,
            end = %window.end,
            limit,
            first_run,
            "fetching news window"
        );

        let candidates = match self.provider.fetch(&source.query_or_symbol, &window, limit).await {
            Ok(v) => v,
            Err(e) => {
                warn!(source = %source.name, provider = self.provider.name(), error = ?e, "news fetch failed");
                outcome.errors.push(format!("{}: fetch: {e:#}", source.name));
                return outcome;
            }
        };

        for raw in candidates {
            let published_at = match raw.published_at {
                Some(ts) => ts,
                None => {
                    warn!(source = %source.name, title = %raw.title, "article has no publication time, using collection time");
                    now
                }
            };
            if now - published_at > Duration::hours(LAG_WARN_HOURS) {
                warn!(
                    source = %source.name,
                    title = %raw.title,
                    lag_hours = (now - published_at).num_hours(),
                    "article published long before collection"
                );
            }

            let article = Article {
                source_id: source.collection.clone(),
                url: raw.url,
                title: raw.title,
                content: raw.content,
                published_at,
                stored_at: now,
                sentiment: None,
            };
            let key = article.dedup_key();

            match self
                .store
                .insert_if_absent(&source.collection, &key, json!(article))
                .await
            {
                Ok(true) => outcome.inserted += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    warn!(source = %source.name, error = ?e, "article insert failed");
                    outcome.errors.push(format!("{}: store: {e:#}", source.name));
                }
            }
        }

        outcome
    }
}
