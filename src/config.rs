// src/config.rs
//! # Pipeline Configuration
//!
//! Source registry plus global collection settings.
//!
//! - Loads from TOML or JSON (`$PIPELINE_CONFIG_PATH`, then
//!   `config/pipeline.toml`, then `config/pipeline.json`).
//! - Falls back to a built-in seed (Bitcoin + S&P 500 + two news queries)
//!   so a fresh checkout runs without any config file.
//! - Read-only input to the pipeline; nothing here is mutated by a run.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "PIPELINE_CONFIG_PATH";

/// What a configured source is: a crypto asset, a stock index, or a news query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Crypto,
    Index,
    News,
}

/// Which side of the crypto-vs-economy comparison a news source feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsTopic {
    Crypto,
    Economy,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// News query string for `kind = news`, ticker symbol otherwise.
    pub query_or_symbol: String,
    /// Target document-store collection.
    pub collection: String,
    /// Provider reporting lag in hours; global default applies when absent.
    #[serde(default)]
    pub delay_hours: Option<i64>,
    /// Per-source fetch cap; global default applies when absent.
    #[serde(default)]
    pub articles_per_query: Option<usize>,
    /// Only meaningful for news sources; used by the summary cycle.
    #[serde(default)]
    pub topic: Option<NewsTopic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Cadence the external scheduler runs collection at.
    #[serde(default = "default_interval_hours")]
    pub collection_interval_hours: i64,
    /// Delay for sources that declare no `delay_hours`, and the span of a
    /// source's first-ever collection window.
    #[serde(default = "default_delay_hours")]
    pub default_delay_hours: i64,
    #[serde(default = "default_articles_per_query")]
    pub articles_per_query: usize,
    /// A lock older than this is treated as abandoned.
    #[serde(default = "default_max_run_minutes")]
    pub max_run_minutes: i64,
    /// Trailing window for the crypto-vs-economy summary.
    #[serde(default = "default_summary_window_hours")]
    pub summary_window_hours: i64,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
}

fn default_interval_hours() -> i64 {
    3
}
fn default_delay_hours() -> i64 {
    24
}
fn default_articles_per_query() -> usize {
    100
}
fn default_max_run_minutes() -> i64 {
    30
}
fn default_summary_window_hours() -> i64 {
    24
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_lock_path() -> PathBuf {
    PathBuf::from("data/collection.lock")
}

impl PipelineConfig {
    /// Load configuration from an explicit path. TOML or JSON by extension,
    /// with cross-parsing as fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
    }

    /// Load using env var + fallbacks:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in seed
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("PIPELINE_CONFIG_PATH points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/pipeline.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/pipeline.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default_seed())
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        if hint_ext == "toml" {
            if let Ok(v) = toml::from_str::<Self>(s) {
                return Ok(v);
            }
        }
        if let Ok(v) = serde_json::from_str::<Self>(s) {
            return Ok(v);
        }
        if hint_ext != "toml" {
            if let Ok(v) = toml::from_str::<Self>(s) {
                return Ok(v);
            }
        }
        Err(anyhow!("unsupported pipeline config format"))
    }

    /// Built-in seed mirroring the default deployment: Bitcoin, S&P 500,
    /// and two NewsAPI queries.
    pub fn default_seed() -> Self {
        let sources = vec![
            SourceConfig {
                name: "Bitcoin".into(),
                kind: SourceKind::Crypto,
                query_or_symbol: "BTC-USD".into(),
                collection: "bitcoin_price".into(),
                delay_hours: None,
                articles_per_query: None,
                topic: None,
            },
            SourceConfig {
                name: "S&P 500".into(),
                kind: SourceKind::Index,
                query_or_symbol: "^GSPC".into(),
                collection: "sp500".into(),
                delay_hours: None,
                articles_per_query: None,
                topic: None,
            },
            SourceConfig {
                name: "Bitcoin News".into(),
                kind: SourceKind::News,
                query_or_symbol: "bitcoin OR btc".into(),
                collection: "bitcoin_articles".into(),
                delay_hours: Some(24),
                articles_per_query: None,
                topic: Some(NewsTopic::Crypto),
            },
            SourceConfig {
                name: "Global Economy News".into(),
                kind: SourceKind::News,
                query_or_symbol: "global economy OR economic outlook OR financial markets".into(),
                collection: "global_economy_articles".into(),
                delay_hours: Some(24),
                articles_per_query: None,
                topic: Some(NewsTopic::Economy),
            },
        ];
        Self {
            sources,
            collection_interval_hours: default_interval_hours(),
            default_delay_hours: default_delay_hours(),
            articles_per_query: default_articles_per_query(),
            max_run_minutes: default_max_run_minutes(),
            summary_window_hours: default_summary_window_hours(),
            data_dir: default_data_dir(),
            lock_path: default_lock_path(),
        }
    }

    pub fn news_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.kind == SourceKind::News)
    }

    pub fn price_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.kind != SourceKind::News)
    }

    pub fn news_collections(&self, topic: NewsTopic) -> Vec<String> {
        self.news_sources()
            .filter(|s| s.topic == Some(topic))
            .map(|s| s.collection.clone())
            .collect()
    }

    pub fn delay_hours_for(&self, source: &SourceConfig) -> i64 {
        source.delay_hours.unwrap_or(self.default_delay_hours)
    }

    pub fn articles_per_query_for(&self, source: &SourceConfig) -> usize {
        source.articles_per_query.unwrap_or(self.articles_per_query)
    }

    /// Nearest-join tolerance: half the collection cadence.
    pub fn join_tolerance(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.collection_interval_hours * 30)
    }
}
