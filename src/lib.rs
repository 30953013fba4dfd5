//! novyny - Ukrainian headline aggregator
//!
//! Fetches top headlines on a schedule, enriches them with full article
//! text, and serves a pre-rendered snapshot page from a pluggable
//! key-value cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod news;
pub mod stats;
pub mod store;
pub mod web;

pub use cache::{CacheStats, ContentCache, LockOutcome};
pub use config::Config;
pub use error::{NovynyError, Result};
pub use news::{
    Article, ArticleSource, ContentExtractor, ExtractorApiClient, FeedSource, GnewsClient,
    RefreshOutcome, RefreshPipeline, Renderer,
};
pub use store::{open_store, KeyValueStore, SharedStore};
pub use web::{create_router, AppState, WebServer};
