// src/collect/providers/yahoo.rs
// Thin wrapper over the Yahoo Finance chart API (hourly bars). The chart
// payload is column-oriented; bars with null fields (halted/padded slots)
// are dropped when zipping.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use super::{PriceProvider, RawBar};
use crate::collect::FetchWindow;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Envelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    // Yahoo wraps the single requested symbol in a one-element array.
    #[serde(default)]
    result: Vec<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooChartProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl YahooChartProvider {
    pub fn from_fixture(body: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.into()),
        }
    }

    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("crypto-sentiment-pipeline/0.1")
            .build()
            .context("building yahoo http client")?;
        Ok(Self {
            mode: Mode::Http { client },
        })
    }

    fn parse_response(body: &str, window: &FetchWindow) -> Result<Vec<RawBar>> {
        let envelope: Envelope = serde_json::from_str(body).context("parsing yahoo chart json")?;
        let result = envelope
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("yahoo chart response has no result"))?;
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let mut out = Vec::with_capacity(result.timestamp.len());
        for (i, &ts) in result.timestamp.iter().enumerate() {
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(ts, 0) else {
                continue;
            };
            if !window.contains(timestamp) {
                continue;
            }
            // A bar is usable only when all four prices are present.
            let (open, high, low, close) = match (
                quote.open.get(i).copied().flatten(),
                quote.high.get(i).copied().flatten(),
                quote.low.get(i).copied().flatten(),
                quote.close.get(i).copied().flatten(),
            ) {
                (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
                _ => continue,
            };
            out.push(RawBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0.0),
            });
        }

        counter!("collect_provider_items_total", "provider" => "yahoo")
            .increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl PriceProvider for YahooChartProvider {
    async fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<RawBar>> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_response(body, window),
            Mode::Http { client } => {
                let url = format!("{CHART_URL}/{symbol}");
                let resp = client
                    .get(&url)
                    .query(&[
                        ("period1", window.start.timestamp().to_string()),
                        ("period2", window.end.timestamp().to_string()),
                        ("interval", "1h".to_string()),
                    ])
                    .send()
                    .await
                    .context("yahoo http get")?
                    .error_for_status()
                    .context("yahoo http status")?;
                let body = resp.text().await.context("yahoo http body")?;
                Self::parse_response(&body, window)
            }
        }
    }

    fn name(&self) -> &'static str {
        "YahooChart"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> FetchWindow {
        // [2024-05-01T09:00, 2024-05-01T12:00]
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        FetchWindow::for_run(now, 24, 3)
    }

    fn fixture() -> String {
        // 10:00 and 11:00 are in window; 13:00 is not; 10:30 has a null close.
        let t0 = 1_714_557_600i64; // 2024-05-01T10:00:00Z
        format!(
            r#"{{"chart":{{"result":[{{
                "timestamp":[{},{},{},{}],
                "indicators":{{"quote":[{{
                    "open":[100.0,101.0,102.0,103.0],
                    "high":[105.0,106.0,107.0,108.0],
                    "low":[ 99.0,100.0,101.0,102.0],
                    "close":[104.0,null,105.5,106.0],
                    "volume":[10.0,11.0,null,13.0]
                }}]}}
            }}]}}}}"#,
            t0,
            t0 + 1800,
            t0 + 3600,
            t0 + 3 * 3600
        )
    }

    #[test]
    fn zips_columns_and_drops_incomplete_bars() {
        let bars = YahooChartProvider::parse_response(&fixture(), &window()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 104.0);
        // Null volume defaults to zero rather than dropping the bar.
        assert_eq!(bars[1].close, 105.5);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn empty_result_is_an_error_but_empty_bars_are_not() {
        let err = YahooChartProvider::parse_response(r#"{"chart":{"result":[]}}"#, &window());
        assert!(err.is_err());

        let ok = YahooChartProvider::parse_response(
            r#"{"chart":{"result":[{"timestamp":[],"indicators":{"quote":[]}}]}}"#,
            &window(),
        )
        .unwrap();
        assert!(ok.is_empty());
    }

    #[tokio::test]
    async fn fixture_mode_serves_parser() {
        let p = YahooChartProvider::from_fixture(fixture());
        let bars = p.fetch("BTC-USD", &window()).await.unwrap();
        assert_eq!(bars.len(), 2);
    }
}
