//! Upstream headline feed client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::{NovynyError, Result};

use super::types::Article;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout in seconds.
const READ_TIMEOUT_SECS: u64 = 20;

/// Total timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User agent string for upstream requests.
const USER_AGENT: &str = "novyny/0.1 (headline aggregator)";

/// Source of headline items. The refresh pipeline only ever asks for the
/// current top headlines in one call.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current headline items, newest first.
    async fn top_headlines(&self) -> Result<Vec<Article>>;
}

/// Top-headlines API response body.
#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Client for a GNews-style top-headlines API.
pub struct GnewsClient {
    client: Client,
    config: FeedConfig,
}

impl GnewsClient {
    /// Create a new client with default timeouts.
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NovynyError::Feed(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl FeedSource for GnewsClient {
    async fn top_headlines(&self) -> Result<Vec<Article>> {
        let response = self
            .client
            .get(&self.config.url)
            .query(&[
                ("apikey", self.config.api_key.as_str()),
                ("country", self.config.country.as_str()),
                ("category", self.config.category.as_str()),
                ("lang", self.config.lang.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NovynyError::Feed(format!("failed to fetch headlines: {e}")))?;

        if !response.status().is_success() {
            return Err(NovynyError::Feed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body: HeadlinesResponse = response
            .json()
            .await
            .map_err(|e| NovynyError::Feed(format!("failed to parse headlines: {e}")))?;

        Ok(body.articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headlines_response() {
        let json = r#"{
            "totalArticles": 2,
            "articles": [
                {
                    "title": "Перша новина",
                    "description": "Опис першої",
                    "content": "Текст... [100 chars]",
                    "url": "https://example.com/1",
                    "publishedAt": "2025-03-01T08:00:00Z",
                    "source": {"name": "Приклад", "url": "https://example.com"}
                },
                {
                    "title": "Друга новина",
                    "description": "",
                    "content": "",
                    "url": "https://example.com/2",
                    "publishedAt": "2025-03-01T07:00:00Z",
                    "source": {"name": "Приклад", "url": "https://example.com"}
                }
            ]
        }"#;

        let body: HeadlinesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.articles.len(), 2);
        assert_eq!(body.articles[0].url, "https://example.com/1");
        assert_eq!(body.articles[1].description, "");
    }

    #[test]
    fn test_parse_headlines_response_without_articles() {
        let body: HeadlinesResponse = serde_json::from_str(r#"{"totalArticles": 0}"#).unwrap();
        assert!(body.articles.is_empty());
    }

    #[test]
    fn test_client_construction() {
        assert!(GnewsClient::new(FeedConfig::default()).is_ok());
    }
}
