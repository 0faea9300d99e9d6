// src/collect/mod.rs
pub mod news;
pub mod prices;
pub mod providers;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::config::PipelineConfig;
use crate::store::DocumentStore;
use crate::types::CollectionOutcome;
use news::NewsCollector;
use prices::PriceCollector;
use providers::{NewsProvider, PriceProvider};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collect_articles_inserted_total",
            "New articles persisted across all news sources."
        );
        describe_counter!(
            "collect_articles_skipped_total",
            "Articles skipped as duplicates."
        );
        describe_counter!(
            "collect_bars_inserted_total",
            "New price bars persisted across all price sources."
        );
        describe_counter!(
            "collect_bars_skipped_total",
            "Price bars skipped as duplicates."
        );
        describe_counter!(
            "collect_source_errors_total",
            "Per-source fetch/storage failures."
        );
        describe_gauge!(
            "collect_last_run_ts",
            "Unix ts when a collection run last finished."
        );
    });
}

/// The slice of history a run requests from a source: the window that has
/// just become available given the provider's reporting delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// `end = now - delay_hours`, `start = end - interval_hours`.
    pub fn for_run(now: DateTime<Utc>, delay_hours: i64, interval_hours: i64) -> Self {
        let end = now - Duration::hours(delay_hours);
        Self {
            start: end - Duration::hours(interval_hours),
            end,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Normalize text: entity decode, strip tags, collapse whitespace.
/// Applied to provider text before dedup keys and sentence splitting.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Everything one `run_collector` invocation produced, per source.
#[derive(Debug, Default)]
pub struct RunReport {
    pub per_source: Vec<(String, CollectionOutcome)>,
}

impl RunReport {
    pub fn total_inserted(&self) -> usize {
        self.per_source.iter().map(|(_, o)| o.inserted).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.per_source.iter().map(|(_, o)| o.skipped).sum()
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.per_source
            .iter()
            .filter(|(_, o)| !o.is_clean())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Run one collection cycle: every news source, then every price source,
/// sequentially. A failing source is reported in its outcome and never
/// stops the others.
pub async fn run_collection(
    store: &dyn DocumentStore,
    cfg: &PipelineConfig,
    news_provider: &dyn NewsProvider,
    price_provider: &dyn PriceProvider,
    now: DateTime<Utc>,
) -> RunReport {
    ensure_metrics_described();

    let mut report = RunReport::default();

    let news = NewsCollector::new(store, news_provider);
    for source in cfg.news_sources() {
        let outcome = news.collect(source, cfg, now).await;
        counter!("collect_articles_inserted_total").increment(outcome.inserted as u64);
        counter!("collect_articles_skipped_total").increment(outcome.skipped as u64);
        counter!("collect_source_errors_total").increment(outcome.errors.len() as u64);
        tracing::info!(
            source = %source.name,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            errors = outcome.errors.len(),
            "news source collected"
        );
        report.per_source.push((source.name.clone(), outcome));
    }

    let prices = PriceCollector::new(store, price_provider);
    for source in cfg.price_sources() {
        let outcome = prices.collect(source, cfg, now).await;
        counter!("collect_bars_inserted_total").increment(outcome.inserted as u64);
        counter!("collect_bars_skipped_total").increment(outcome.skipped as u64);
        counter!("collect_source_errors_total").increment(outcome.errors.len() as u64);
        tracing::info!(
            source = %source.name,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            errors = outcome.errors.len(),
            "price source collected"
        );
        report.per_source.push((source.name.clone(), outcome));
    }

    gauge!("collect_last_run_ts").set(now.timestamp() as f64);
    report
}
