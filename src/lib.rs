// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod collect;
pub mod config;
pub mod correlate;
pub mod lock;
pub mod logging;
pub mod metrics;
pub mod sentiment;
pub mod store;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::collect::{run_collection, RunReport};
pub use crate::config::PipelineConfig;
pub use crate::correlate::{CorrelationEngine, Lookback};
pub use crate::lock::RunLock;
pub use crate::store::{DocumentStore, JsonFileStore, MemStore};
pub use crate::types::{Article, PriceBar, Sentiment, SentimentLabel, SentimentSummary};
