// src/collect/providers/newsapi.rs
// Thin wrapper over the NewsAPI `everything` endpoint. Fixture mode feeds
// the same parser from a canned JSON body for tests and offline runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use super::{NewsProvider, RawArticle};
use crate::collect::FetchWindow;

const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    articles: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

pub struct NewsApiProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { api_key: String, client: reqwest::Client },
}

impl NewsApiProvider {
    /// Serve canned response bodies; used by tests and dry runs.
    pub fn from_fixture(body: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.into()),
        }
    }

    /// Live client; the key comes from `NEWS_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("NEWS_API_KEY").context("NEWS_API_KEY environment variable is required")?;
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building newsapi http client")?;
        Ok(Self {
            mode: Mode::Http { api_key, client },
        })
    }

    fn parse_response(body: &str, window: &FetchWindow, limit: usize) -> Result<Vec<RawArticle>> {
        let envelope: Envelope = serde_json::from_str(body).context("parsing newsapi json")?;
        counter!("collect_provider_items_total", "provider" => "newsapi")
            .increment(envelope.articles.len() as u64);

        let mut out: Vec<RawArticle> = envelope
            .articles
            .into_iter()
            .filter_map(|item| {
                let title = crate::collect::normalize_text(item.title.as_deref().unwrap_or_default());
                if title.is_empty() {
                    return None;
                }
                let published_at = item
                    .published_at
                    .as_deref()
                    .and_then(parse_provider_time);
                // Keep articles with unknown timestamps; only a provably
                // out-of-window timestamp excludes a candidate.
                if let Some(ts) = published_at {
                    if !window.contains(ts) {
                        return None;
                    }
                }
                let content = crate::collect::normalize_text(&format!(
                    "{} {}",
                    item.description.as_deref().unwrap_or_default(),
                    item.content.as_deref().unwrap_or_default()
                ));
                Some(RawArticle {
                    url: item.url.filter(|u| !u.is_empty()),
                    title,
                    content,
                    published_at,
                })
            })
            .collect();

        // Most-recent-first; stable sort keeps provider order on ties and
        // pushes unknown timestamps last.
        out.sort_by_key(|a| std::cmp::Reverse(a.published_at.unwrap_or(DateTime::<Utc>::MIN_UTC)));
        out.truncate(limit);
        Ok(out)
    }
}

#[async_trait]
impl NewsProvider for NewsApiProvider {
    async fn fetch(
        &self,
        query: &str,
        window: &FetchWindow,
        limit: usize,
    ) -> Result<Vec<RawArticle>> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_response(body, window, limit),
            Mode::Http { api_key, client } => {
                let resp = client
                    .get(NEWSAPI_URL)
                    .query(&[
                        ("q", query),
                        ("language", "en"),
                        ("sortBy", "publishedAt"),
                        ("pageSize", &limit.min(100).to_string()),
                        ("from", &window.start.to_rfc3339()),
                        ("to", &window.end.to_rfc3339()),
                        ("apiKey", api_key.as_str()),
                    ])
                    .send()
                    .await
                    .context("newsapi http get")?
                    .error_for_status()
                    .context("newsapi http status")?;
                let body = resp.text().await.context("newsapi http body")?;
                Self::parse_response(&body, window, limit)
            }
        }
    }

    fn name(&self) -> &'static str {
        "NewsAPI"
    }
}

fn parse_provider_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> FetchWindow {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        FetchWindow::for_run(now, 24, 3)
    }

    #[test]
    fn parses_sorts_and_filters_window() {
        // Window is [2024-05-01T09:00, 2024-05-01T12:00].
        let body = r#"{"status":"ok","articles":[
            {"title":"Older in window","url":"https://n.test/1",
             "description":"d","content":"c","publishedAt":"2024-05-01T09:30:00Z"},
            {"title":"Newer in window","url":"https://n.test/2",
             "description":"d","content":"c","publishedAt":"2024-05-01T11:00:00Z"},
            {"title":"Too new","url":"https://n.test/3",
             "description":"d","content":"c","publishedAt":"2024-05-01T13:00:00Z"},
            {"title":"No timestamp","url":"https://n.test/4",
             "description":"d","content":"c"}
        ]}"#;
        let out = NewsApiProvider::parse_response(body, &window(), 100).unwrap();
        let titles: Vec<_> = out.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer in window", "Older in window", "No timestamp"]);
        assert!(out[2].published_at.is_none());
    }

    #[test]
    fn untitled_articles_are_dropped_and_limit_applies() {
        let body = r#"{"articles":[
            {"title":"  ","url":"https://n.test/x","publishedAt":"2024-05-01T10:00:00Z"},
            {"title":"A","url":"https://n.test/a","publishedAt":"2024-05-01T10:00:00Z"},
            {"title":"B","url":"https://n.test/b","publishedAt":"2024-05-01T10:30:00Z"}
        ]}"#;
        let out = NewsApiProvider::parse_response(body, &window(), 1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "B");
    }

    #[tokio::test]
    async fn fixture_mode_serves_parser() {
        let p = NewsApiProvider::from_fixture(r#"{"articles":[]}"#);
        let out = p.fetch("bitcoin", &window(), 10).await.unwrap();
        assert!(out.is_empty());
    }
}
