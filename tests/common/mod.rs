//! Shared helpers for integration tests: stub feed and extractor
//! implementations and article builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use novyny::news::{ContentExtractor, FeedSource, Renderer};
use novyny::{Article, Config, ContentCache, RefreshPipeline, Result, SharedStore};

/// Feed stub returning a fixed article list, or failing outright.
pub struct StubFeed {
    articles: Mutex<Vec<Article>>,
    fail: bool,
}

impl StubFeed {
    pub fn returning(articles: Vec<Article>) -> Box<Self> {
        Box::new(Self {
            articles: Mutex::new(articles),
            fail: false,
        })
    }

    pub fn failing() -> Box<Self> {
        Box::new(Self {
            articles: Mutex::new(Vec::new()),
            fail: true,
        })
    }
}

#[async_trait]
impl FeedSource for StubFeed {
    async fn top_headlines(&self) -> Result<Vec<Article>> {
        if self.fail {
            return Err(novyny::NovynyError::Feed("unreachable".to_string()));
        }
        Ok(self.articles.lock().unwrap().clone())
    }
}

/// Extractor stub serving canned text per URL, counting calls.
pub struct StubExtractor {
    texts: HashMap<String, String>,
    pub calls: Arc<AtomicUsize>,
}

impl StubExtractor {
    pub fn unreachable_service() -> Box<Self> {
        Box::new(Self {
            texts: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_text_for(urls: &[&str]) -> Box<Self> {
        let texts = urls
            .iter()
            .map(|u| {
                (
                    u.to_string(),
                    "Перший рядок ліду\nДругий рядок повного тексту".to_string(),
                )
            })
            .collect();
        Box::new(Self {
            texts,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl ContentExtractor for StubExtractor {
    async fn extract(&self, url: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.get(url).cloned()
    }
}

/// An article with the given URL and a Ukrainian title.
pub fn article(url: &str, title: &str) -> Article {
    Article {
        url: url.to_string(),
        title: title.to_string(),
        description: String::new(),
        content: String::new(),
        content_full: None,
        published_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        source: Default::default(),
    }
}

/// A pipeline over the given store with a short lock TTL, suitable for
/// contention tests.
pub fn pipeline_over(
    store: SharedStore,
    lock_ttl: Duration,
    feed: Box<dyn FeedSource>,
    extractor: Box<dyn ContentExtractor>,
) -> (Arc<ContentCache>, RefreshPipeline, Arc<Renderer>) {
    let cache = Arc::new(ContentCache::new(store, lock_ttl));
    let renderer = Arc::new(Renderer::new("Europe/Kyiv", "Новини").unwrap());
    let pipeline = RefreshPipeline::new(
        cache.clone(),
        feed,
        extractor,
        renderer.clone(),
        &Config::default(),
    );
    (cache, pipeline, renderer)
}
