// src/correlate.rs
//! # Correlation Engine
//! Joins the sentiment series and the price series for an asset by
//! nearest-timestamp matching and computes a Pearson coefficient over the
//! paired points. Alignment is an explicit two-pointer merge over the two
//! time-ordered sequences with a tolerance parameter, so behavior at
//! window edges is deterministic and testable. Fewer than two pairs is
//! "insufficient data", reported as `coefficient = NaN, points = 0`.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::PipelineConfig;
use crate::store::DocumentStore;

/// Selectable history span for a correlation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl Lookback {
    pub fn duration(self) -> Duration {
        match self {
            Lookback::Day => Duration::hours(24),
            Lookback::ThreeDays => Duration::days(3),
            Lookback::Week => Duration::days(7),
            Lookback::Month => Duration::days(30),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lookback::Day => "24h",
            Lookback::ThreeDays => "3d",
            Lookback::Week => "7d",
            Lookback::Month => "30d",
        }
    }
}

impl FromStr for Lookback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "24h" => Ok(Lookback::Day),
            "3d" => Ok(Lookback::ThreeDays),
            "7d" => Ok(Lookback::Week),
            "30d" => Ok(Lookback::Month),
            other => anyhow::bail!("unknown lookback {other:?} (expected 24h, 3d, 7d or 30d)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

/// Result of one correlation query. `coefficient` is NaN (serialized as
/// null) when fewer than two pairs survive alignment or the paired series
/// has zero variance; the raw series are returned either way so the
/// dashboard can still draw them.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub points: usize,
    pub coefficient: f64,
    /// Raw sentiment series inside the window, including unmatched points.
    pub series_a: Vec<SeriesPoint>,
    /// Raw price series inside the window, including unmatched points.
    pub series_b: Vec<SeriesPoint>,
}

/// Pair each point of `a` with the nearest point of `b` within
/// `tolerance`. Both inputs must be time-ordered ascending. Unmatched
/// points are dropped. Ties resolve to the earlier `b` point.
pub fn align_nearest(
    a: &[SeriesPoint],
    b: &[SeriesPoint],
    tolerance: Duration,
) -> Vec<(f64, f64)> {
    let mut pairs = Vec::new();
    let mut j = 0usize;

    for pa in a {
        // Advance while the next b point is at least as close.
        while j + 1 < b.len() && gap(b[j + 1].ts, pa.ts) < gap(b[j].ts, pa.ts) {
            j += 1;
        }
        if b.is_empty() {
            break;
        }
        if gap(b[j].ts, pa.ts) <= tolerance {
            pairs.push((pa.value, b[j].value));
        }
    }
    pairs
}

fn gap(x: DateTime<Utc>, y: DateTime<Utc>) -> Duration {
    if x >= y {
        x - y
    } else {
        y - x
    }
}

/// Pearson correlation coefficient over paired samples. NaN when fewer
/// than two pairs exist or either side has zero variance.
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }
    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

pub struct CorrelationEngine<'a> {
    store: &'a dyn DocumentStore,
    cfg: &'a PipelineConfig,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(store: &'a dyn DocumentStore, cfg: &'a PipelineConfig) -> Self {
        Self { store, cfg }
    }

    /// Correlate scored-article sentiment from `news_collection` against
    /// closing prices from `price_collection` over `[now - lookback, now]`.
    pub async fn correlate(
        &self,
        price_collection: &str,
        news_collection: &str,
        lookback: Lookback,
        now: DateTime<Utc>,
    ) -> Result<CorrelationReport> {
        let start = now - lookback.duration();

        let sentiment_docs = self
            .store
            .query_range(news_collection, "published_at", start, now)
            .await?;
        let series_a: Vec<SeriesPoint> = sentiment_docs
            .iter()
            .filter_map(|doc| {
                let ts = crate::store::field_time(doc, "published_at")?;
                let value = doc.get("sentiment")?.get("score")?.as_f64()?;
                Some(SeriesPoint { ts, value })
            })
            .collect();

        let price_docs = self
            .store
            .query_range(price_collection, "timestamp", start, now)
            .await?;
        let series_b: Vec<SeriesPoint> = price_docs
            .iter()
            .filter_map(|doc| {
                let ts = crate::store::field_time(doc, "timestamp")?;
                let value = doc.get("close")?.as_f64()?;
                Some(SeriesPoint { ts, value })
            })
            .collect();

        let pairs = align_nearest(&series_a, &series_b, self.cfg.join_tolerance());
        let coefficient = pearson(&pairs);
        // Fewer than two pairs is "insufficient data"; a zero-variance
        // series still reports its pair count, only the coefficient is NaN.
        let points = if pairs.len() < 2 { 0 } else { pairs.len() };

        Ok(CorrelationReport {
            points,
            coefficient,
            series_a,
            series_b,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn pt(min: i64, value: f64) -> SeriesPoint {
        SeriesPoint { ts: at(min), value }
    }

    #[test]
    fn lookback_round_trips() {
        for s in ["24h", "3d", "7d", "30d"] {
            assert_eq!(s.parse::<Lookback>().unwrap().as_str(), s);
        }
        assert!("1y".parse::<Lookback>().is_err());
    }

    #[test]
    fn nearest_match_within_tolerance() {
        let a = vec![pt(0, 0.5), pt(100, 0.7), pt(500, 0.9)];
        let b = vec![pt(10, 100.0), pt(90, 200.0), pt(180, 300.0)];
        let pairs = align_nearest(&a, &b, Duration::minutes(30));
        // a[0] -> b[0] (10m), a[1] -> b[1] (10m), a[2] unmatched (320m).
        assert_eq!(pairs, vec![(0.5, 100.0), (0.7, 200.0)]);
    }

    #[test]
    fn tie_resolves_to_earlier_bar() {
        let a = vec![pt(60, 0.5)];
        let b = vec![pt(30, 1.0), pt(90, 2.0)];
        let pairs = align_nearest(&a, &b, Duration::hours(1));
        assert_eq!(pairs, vec![(0.5, 1.0)]);
    }

    #[test]
    fn empty_price_series_matches_nothing() {
        let a = vec![pt(0, 0.5)];
        assert!(align_nearest(&a, &[], Duration::hours(1)).is_empty());
    }

    #[test]
    fn pearson_of_lockstep_series_is_one() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 3.0 * i as f64 + 7.0)).collect();
        assert!((pearson(&pairs) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_of_inverse_series_is_minus_one() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, -2.0 * i as f64)).collect();
        assert!((pearson(&pairs) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_yield_nan() {
        assert!(pearson(&[]).is_nan());
        assert!(pearson(&[(1.0, 2.0)]).is_nan());
        // Zero variance on one side.
        assert!(pearson(&[(1.0, 5.0), (2.0, 5.0), (3.0, 5.0)]).is_nan());
    }
}
