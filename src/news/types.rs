//! Feed item types.
//!
//! The JSON shape mirrors the upstream headline API (camelCase
//! `publishedAt`, nested `source`), with one extra `content_full` field
//! filled in by enrichment. Cached snapshots serialize this same shape, so
//! an item round-trips untouched between refresh cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publishing site of an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    /// Site name.
    #[serde(default)]
    pub name: String,
    /// Site URL.
    #[serde(default)]
    pub url: String,
}

/// One feed entry, uniquely identified by its `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Canonical article URL; the sole de-duplication key.
    pub url: String,
    /// Headline.
    #[serde(default)]
    pub title: String,
    /// Short description from the feed.
    #[serde(default)]
    pub description: String,
    /// Truncated teaser from the feed.
    #[serde(default)]
    pub content: String,
    /// Full article text, present once enrichment has succeeded. Its
    /// absence is the retry signal for the next cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_full: Option<String>,
    /// Publication timestamp.
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    /// Publishing site.
    #[serde(default)]
    pub source: ArticleSource,
}

impl Article {
    /// Host part of the source URL, for display.
    pub fn source_domain(&self) -> &str {
        let url = &self.source.url;
        match url.find("://") {
            Some(idx) => &url[idx + 3..],
            None => url,
        }
    }
}
