//! The refresh pipeline: gate, fetch, merge/filter, enrich, normalize,
//! persist.
//!
//! One invocation runs entirely under the cache's refresh lock. Every
//! failure is contained to its step: a fetch error aborts the cycle and
//! leaves the previous snapshot untouched, a failed enrichment leaves the
//! item with its teaser, and lock contention is a normal outcome rather
//! than an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::cache::{ContentCache, LockOutcome};
use crate::config::Config;
use crate::Result;

use super::extract::ContentExtractor;
use super::feed::FeedSource;
use super::normalize;
use super::policy;
use super::render::Renderer;
use super::types::Article;

/// Outcome of one refresh invocation. Only `Refreshed` touched upstream
/// services; everything else is an early exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A full cycle ran.
    Refreshed {
        /// New items merged into the snapshot.
        added: usize,
        /// Items that gained full text this cycle.
        enriched: usize,
    },
    /// The snapshot predated this process; its page was rebuilt with the
    /// current markup and nothing was fetched.
    Rerendered,
    /// The refresh interval has not elapsed yet.
    NotDue,
    /// Another refresh holds the lock.
    Locked,
    /// The cycle overran the lock TTL and was abandoned.
    TimedOut,
    /// The upstream feed could not be fetched; the cache is untouched.
    FetchFailed,
}

/// Orchestrates refresh cycles against a [`ContentCache`].
pub struct RefreshPipeline {
    cache: Arc<ContentCache>,
    feed: Box<dyn FeedSource>,
    extractor: Box<dyn ContentExtractor>,
    renderer: Arc<Renderer>,
    interval: Duration,
    max_items: usize,
    concurrency: usize,
    denylist: Vec<String>,
    started_at: DateTime<Utc>,
}

impl RefreshPipeline {
    /// Create a pipeline wired to the given collaborators.
    pub fn new(
        cache: Arc<ContentCache>,
        feed: Box<dyn FeedSource>,
        extractor: Box<dyn ContentExtractor>,
        renderer: Arc<Renderer>,
        config: &Config,
    ) -> Self {
        // Whole seconds, matching the resolution of the stored update
        // timestamp it is compared against.
        let now = Utc::now();
        let started_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        Self {
            cache,
            feed,
            extractor,
            renderer,
            interval: Duration::from_secs(config.feed.interval_secs),
            max_items: config.cache.max_items,
            concurrency: config.extractor.concurrency.max(1),
            denylist: config.policy.denylist.clone(),
            started_at,
        }
    }

    /// Override the process start time used for the post-deploy snapshot
    /// rebuild check.
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Access the cache this pipeline writes to.
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Run one refresh invocation under the cache lock.
    pub async fn run(&self) -> Result<RefreshOutcome> {
        match self.cache.lock(self.cycle()).await? {
            LockOutcome::Completed(outcome) => outcome,
            LockOutcome::Contended => {
                debug!("Refresh already in progress elsewhere");
                Ok(RefreshOutcome::Locked)
            }
            LockOutcome::TimedOut => {
                warn!("Refresh cycle exceeded the lock TTL and was abandoned");
                Ok(RefreshOutcome::TimedOut)
            }
        }
    }

    async fn cycle(&self) -> Result<RefreshOutcome> {
        let old = self.cache.get().await?;

        // A snapshot written by a previous deployment gets its page
        // rebuilt with the current markup before any new content.
        if let Some(updated) = self.cache.updated().await? {
            if updated < self.started_at {
                info!("Rebuilding snapshot page from a previous deployment");
                let render = |items: &[Article]| self.renderer.render_page(items);
                self.cache.put(&old, Some(&render)).await?;
                return Ok(RefreshOutcome::Rerendered);
            }
        }

        if !self.cache.check_refresh_due(self.interval).await? {
            return Ok(RefreshOutcome::NotDue);
        }

        let fetched = match self.feed.top_headlines().await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!("News fetching failure: {e}");
                return Ok(RefreshOutcome::FetchFailed);
            }
        };

        let fresh: Vec<Article> = {
            let mut seen: HashSet<&str> = old.iter().map(|a| a.url.as_str()).collect();
            let mut fresh = Vec::new();
            for article in &fetched {
                if !policy::looks_ukrainian(&article.title) {
                    continue;
                }
                if policy::matches_denylist(&article.title, &article.description, &self.denylist)
                {
                    continue;
                }
                if !seen.insert(article.url.as_str()) {
                    continue;
                }
                fresh.push(article.clone());
            }
            fresh
        };
        let added = fresh.len();

        let mut items: Vec<Article> = fresh
            .into_iter()
            .chain(old)
            .take(self.max_items)
            .collect();

        // Enrich every item still lacking full text, bounded by the
        // configured concurrency. Completion order is irrelevant; each
        // task only fills its own slot.
        let pending: Vec<usize> = items
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.content_full.is_none().then_some(i))
            .collect();
        let attempted = pending.len();

        let results: Vec<(usize, Option<String>)> = futures::stream::iter(pending)
            .map(|i| {
                let url = items[i].url.clone();
                async move { (i, self.extractor.extract(&url).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut enriched = 0;
        for (i, text) in results {
            if let Some(text) = text {
                items[i].content_full = Some(text);
                enriched += 1;
            }
        }

        for article in items.iter_mut() {
            if let Some(full) = article.content_full.take() {
                let cleaned = normalize::clean_full_text(&full);
                let (description, content) = normalize::derive_description(
                    &article.title,
                    &article.description,
                    &cleaned,
                );
                article.description = description;
                article.content_full = Some(content);
            }
        }

        let has_page = self.cache.page().await?.is_some();
        if added > 0 || attempted > 0 || !has_page {
            let render = |items: &[Article]| self.renderer.render_page(items);
            let written = self.cache.put(&items, Some(&render)).await?;
            debug!("Snapshot written with {written} item(s)");
        }
        self.cache.running_average(added as i64).await?;

        info!("Refresh complete: {added} new item(s), {enriched} enriched");
        Ok(RefreshOutcome::Refreshed { added, enriched })
    }
}
