// src/collect/prices.rs
//! Price-bar collection for one asset or index source. Same delay-window
//! logic as news, keyed on `(symbol, timestamp)`; the first stored value
//! for a timestamp wins and re-fetches are skipped, never upserted.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

use super::providers::PriceProvider;
use super::FetchWindow;
use crate::config::{PipelineConfig, SourceConfig};
use crate::store::DocumentStore;
use crate::types::{CollectionOutcome, PriceBar};

pub struct PriceCollector<'a> {
    store: &'a dyn DocumentStore,
    provider: &'a dyn PriceProvider,
}

impl<'a> PriceCollector<'a> {
    pub fn new(store: &'a dyn DocumentStore, provider: &'a dyn PriceProvider) -> Self {
        Self { store, provider }
    }

    pub async fn collect(
        &self,
        source: &SourceConfig,
        cfg: &PipelineConfig,
        now: DateTime<Utc>,
    ) -> CollectionOutcome {
        let mut outcome = CollectionOutcome::default();

        // Same bootstrap rule as news: a first-ever run covers the full
        // default delay instead of one cadence slice.
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
        debug!(
            source = %source.name,
            symbol = %source.query_or_symbol,
            start = %window.start,
            end = %window.end,
            first_run,
            "fetching price window"
        );

        let bars = match self.provider.fetch(&source.query_or_symbol, &window).await {
            Ok(v) => v,
            Err(e) => {
                warn!(source = %source.name, provider = self.provider.name(), error = ?e, "price fetch failed");
                outcome.errors.push(format!("{}: fetch: {e:#}", source.name));
                return outcome;
            }
        };

        if bars.is_empty() {
            // Market closed or provider gap; a normal outcome, not an error.
            debug!(source = %source.name, "no bars in window");
            return outcome;
        }

        for raw in bars {
            let bar = PriceBar {
                source_id: source.collection.clone(),
                symbol: source.query_or_symbol.clone(),
                timestamp: raw.timestamp,
                collection_time: now,
                open: raw.open,
                high: raw.high,
                low: raw.low,
                close: raw.close,
                volume: raw.volume,
            };
            let key = bar.dedup_key();

            match self
                .store
                .insert_if_absent(&source.collection, &key, json!(bar))
                .await
            {
                Ok(true) => outcome.inserted += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    warn!(source = %source.name, error = ?e, "bar insert failed");
                    outcome.errors.push(format!("{}: store: {e:#}", source.name));
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::providers::{PriceProvider, RawBar};
    use crate::store::MemStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct EmptyProvider;

    #[async_trait]
    impl PriceProvider for EmptyProvider {
        async fn fetch(&self, _symbol: &str, _window: &FetchWindow) -> Result<Vec<RawBar>> {
            Ok(Vec::new())
        }
        fn name(&self) -> &'static str {
            "Empty"
        }
    }

    /// Emits one bar at a fixed market timestamp when it falls inside the
    /// requested window, like the real chart provider does.
    struct OneBarProvider(DateTime<Utc>);

    #[async_trait]
    impl PriceProvider for OneBarProvider {
        async fn fetch(&self, _symbol: &str, window: &FetchWindow) -> Result<Vec<RawBar>> {
            if !window.contains(self.0) {
                return Ok(Vec::new());
            }
            Ok(vec![RawBar {
                timestamp: self.0,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 3.0,
            }])
        }
        fn name(&self) -> &'static str {
            "OneBar"
        }
    }

    #[tokio::test]
    async fn data_gap_is_not_an_error() {
        let cfg = PipelineConfig::default_seed();
        let store = MemStore::new();
        let collector = PriceCollector::new(&store, &EmptyProvider);
        let source = cfg.price_sources().next().unwrap();
        let outcome = collector.collect(source, &cfg, Utc::now()).await;
        assert_eq!(outcome.inserted, 0);
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn refetching_the_same_bar_skips_it() {
        let cfg = PipelineConfig::default_seed();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        // Inside every window this test produces: [end-3h, end] and wider.
        let provider = OneBarProvider(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
        let store = MemStore::new();
        let collector = PriceCollector::new(&store, &provider);
        let source = cfg.price_sources().next().unwrap();

        let first = collector.collect(source, &cfg, now).await;
        assert_eq!((first.inserted, first.skipped), (1, 0));

        let second = collector.collect(source, &cfg, now).await;
        assert_eq!((second.inserted, second.skipped), (0, 1));
        assert_eq!(store.len(&source.collection), 1);
    }

    #[tokio::test]
    async fn first_run_covers_the_full_default_delay() {
        let cfg = PipelineConfig::default_seed();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        // 2024-05-01T02:00 is 10h before the window end: outside the 3h
        // cadence slice, inside the 24h bootstrap window.
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        let provider = OneBarProvider(ts);
        let store = MemStore::new();
        let collector = PriceCollector::new(&store, &provider);
        let source = cfg.price_sources().next().unwrap();

        let first = collector.collect(source, &cfg, now).await;
        assert_eq!((first.inserted, first.skipped), (1, 0));

        // The collection is no longer empty, so the next run is back to one
        // cadence slice and the old bar falls outside it.
        let second = collector.collect(source, &cfg, now).await;
        assert_eq!((second.inserted, second.skipped), (0, 0));
        assert!(second.is_clean());
        assert_eq!(store.len(&source.collection), 1);
    }
}
