use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::config::PipelineConfig;
use crate::correlate::{CorrelationEngine, Lookback};
use crate::sentiment::summary::compute_summary;
use crate::store::DocumentStore;
use crate::types::SentimentSummary;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": msg.into() })))
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cfg: Arc<PipelineConfig>,
}

pub fn create_router(store: Arc<dyn DocumentStore>, cfg: Arc<PipelineConfig>) -> Router {
    let state = AppState { store, cfg };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/sources", get(list_sources))
        .route("/api/summary", get(summary))
        .route("/api/correlation", get(correlation))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct SourceOut {
    name: String,
    kind: String,
    collection: String,
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceOut>> {
    let out = state
        .cfg
        .sources
        .iter()
        .map(|s| SourceOut {
            name: s.name.clone(),
            kind: format!("{:?}", s.kind).to_lowercase(),
            collection: s.collection.clone(),
        })
        .collect();
    Json(out)
}

async fn summary(State(state): State<AppState>) -> Result<Json<SentimentSummary>, ApiError> {
    match compute_summary(state.store.as_ref(), &state.cfg, Utc::now()).await {
        Ok(s) => Ok(Json(s)),
        Err(err) => {
            error!(error = %err, "summary query failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error"))
        }
    }
}

#[derive(serde::Deserialize)]
struct CorrelationQuery {
    price: String,
    news: String,
    #[serde(default = "default_lookback")]
    lookback: String,
}

fn default_lookback() -> String {
    "7d".to_string()
}

#[derive(serde::Serialize)]
struct CorrelationOut {
    price: String,
    news: String,
    lookback: String,
    points: usize,
    /// None when fewer than two aligned pairs exist in the window.
    coefficient: Option<f64>,
    series_sentiment: Vec<crate::correlate::SeriesPoint>,
    series_price: Vec<crate::correlate::SeriesPoint>,
}

async fn correlation(
    State(state): State<AppState>,
    Query(q): Query<CorrelationQuery>,
) -> Result<Json<CorrelationOut>, ApiError> {
    let lookback = Lookback::from_str(&q.lookback)
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.to_string()))?;

    let engine = CorrelationEngine::new(state.store.as_ref(), &state.cfg);
    let report = engine
        .correlate(&q.price, &q.news, lookback, Utc::now())
        .await
        .map_err(|err| {
            error!(error = %err, price = %q.price, news = %q.news, "correlation query failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        })?;

    Ok(Json(CorrelationOut {
        price: q.price,
        news: q.news,
        lookback: lookback.as_str().to_string(),
        points: report.points,
        coefficient: if report.coefficient.is_nan() {
            None
        } else {
            Some(report.coefficient)
        },
        series_sentiment: report.series_a,
        series_price: report.series_b,
    }))
}
