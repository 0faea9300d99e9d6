//! Collection Entrypoint
//! One cron-driven collection cycle: take the run lock, pull the delayed
//! window from every configured source, write new documents, release the
//! lock. Exits 0 when another run already holds the lock.

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info, warn};

use crypto_sentiment_pipeline::collect::providers::{NewsApiProvider, YahooChartProvider};
use crypto_sentiment_pipeline::collect::run_collection;
use crypto_sentiment_pipeline::config::PipelineConfig;
use crypto_sentiment_pipeline::lock::{LockError, RunLock};
use crypto_sentiment_pipeline::logging;
use crypto_sentiment_pipeline::store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init("collector")?;

    let cfg = PipelineConfig::load_default().context("loading pipeline config")?;
    let store = JsonFileStore::open(&cfg.data_dir).with_context(|| {
        format!("open document store at {}", cfg.data_dir.display())
    })?;

    let news_provider = NewsApiProvider::from_env().context("configuring news provider")?;
    let price_provider = YahooChartProvider::new().context("configuring price provider")?;

    let lock = RunLock::new(&cfg.lock_path, cfg.max_run_minutes);
    let token = match lock.acquire() {
        Ok(t) => t,
        Err(LockError::AlreadyRunning { holder, age_secs }) => {
            info!(holder = %holder, age_secs, "another collection run is active, exiting");
            return Ok(());
        }
        Err(e) => return Err(anyhow::anyhow!(e)).context("acquiring run lock"),
    };

    let now = Utc::now();
    let report = run_collection(&store, &cfg, &news_provider, &price_provider, now).await;

    let failed = report.failed_sources();
    info!(
        inserted = report.total_inserted(),
        skipped = report.total_skipped(),
        failed = failed.len(),
        "collection cycle finished"
    );
    if !failed.is_empty() {
        warn!(sources = ?failed, "some sources reported errors");
    }

    if let Err(e) = lock.release(&token) {
        // The next run reclaims a stale lock after max_run_minutes.
        error!(error = %e, "failed to release run lock");
    }
    Ok(())
}
