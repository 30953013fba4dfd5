//! Snapshot cache over a [`KeyValueStore`] backend.
//!
//! Owns the well-known keys: last refresh-due check (`ts`), last successful
//! write (`upd`), the serialized item collection (`data`), the pre-rendered
//! page (`page`), the refresh lock (`lock`) and the daily counters
//! (`count_avg`, `count_cur`, `count_mark`). Readers never take the lock;
//! they see either the previous complete snapshot or a newer complete one,
//! because every write lands as one multi-key update (redis) or an atomic
//! file rename (filesystem).

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::time::{sleep, timeout, Instant};
use tracing::warn;

use crate::news::Article;
use crate::store::SharedStore;
use crate::Result;

const TS_KEY: &str = "ts";
const UPD_KEY: &str = "upd";
const DATA_KEY: &str = "data";
const PAGE_KEY: &str = "page";
const LOCK_KEY: &str = "lock";
const COUNT_AVG_KEY: &str = "count_avg";
const COUNT_CUR_KEY: &str = "count_cur";
const COUNT_MARK_KEY: &str = "count_mark";

/// Delay between lock acquisition attempts.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Result of running an operation under the refresh lock.
#[derive(Debug)]
pub enum LockOutcome<T> {
    /// The operation ran to completion while holding the lock.
    Completed(T),
    /// Another holder kept the lock for the whole acquisition deadline.
    /// Normal contention, not an error.
    Contended,
    /// The operation overran the lock TTL and was abandoned; the lock was
    /// still released.
    TimedOut,
}

impl<T> LockOutcome<T> {
    /// True when the wrapped operation actually ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, LockOutcome::Completed(_))
    }
}

/// Best-effort operational statistics. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Last refresh-due check.
    pub checked_at: Option<DateTime<Utc>>,
    /// Last successful snapshot write.
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of cached items, when the stored JSON parses.
    pub item_count: Option<usize>,
    /// Size in bytes of the stored JSON.
    pub byte_size: Option<usize>,
    /// Daily running average of items added per refresh.
    pub daily_average: Option<i64>,
}

/// The snapshot cache.
pub struct ContentCache {
    store: SharedStore,
    lock_ttl: Duration,
}

impl ContentCache {
    /// Create a cache over the given store backend.
    pub fn new(store: SharedStore, lock_ttl: Duration) -> Self {
        Self { store, lock_ttl }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Time of the last successful snapshot write, if any.
    pub async fn updated(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get(UPD_KEY)
            .await?
            .and_then(|raw| parse_epoch(&raw)))
    }

    /// The cached item collection. Absent or corrupt data reads as empty;
    /// this never fails the caller.
    pub async fn get(&self) -> Result<Vec<Article>> {
        let raw = match self.store.get(DATA_KEY).await? {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!("Cached item data is corrupt, treating as empty: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// The pre-rendered snapshot page, if one has been stored.
    pub async fn page(&self) -> Result<Option<String>> {
        self.store.get(PAGE_KEY).await
    }

    /// Persist the item collection and, when a render function is given,
    /// the page snapshot built from it (rendered at most once).
    ///
    /// When the shared backend rejects the payload as oversized, the oldest
    /// item is dropped and the write retried until it succeeds or nothing
    /// is left. Returns the number of items actually written.
    pub async fn put(
        &self,
        items: &[Article],
        render: Option<&(dyn Fn(&[Article]) -> String + Sync)>,
    ) -> Result<usize> {
        let page = render.map(|f| f(items));
        let mut items = items.to_vec();

        loop {
            let now = Utc::now().timestamp().to_string();
            let data = serde_json::to_string(&items)
                .map_err(|e| crate::NovynyError::Store(format!("serialize items: {e}")))?;

            let mut entries = vec![(UPD_KEY, now), (DATA_KEY, data)];
            if let Some(page) = &page {
                entries.push((PAGE_KEY, page.clone()));
            }

            if self.store.set_multi(&entries, None).await? {
                return Ok(items.len());
            }
            if items.is_empty() {
                warn!("Snapshot write rejected even when empty, giving up");
                return Ok(0);
            }
            // Items are newest-first; the last one is the oldest.
            let dropped = items.pop();
            warn!(
                "Snapshot payload too large for store, dropping oldest item: {}",
                dropped.map(|a| a.url).unwrap_or_default()
            );
        }
    }

    /// Pre-filter for the refresh cycle: true when no check has been
    /// recorded yet or more than `interval` has elapsed since the last one.
    /// Records the check time on a positive answer, so repeated calls
    /// within the interval answer false. Racing callers are tolerated; the
    /// lock is the actual correctness boundary.
    pub async fn check_refresh_due(&self, interval: Duration) -> Result<bool> {
        let now = Utc::now().timestamp();
        let last = self
            .store
            .get(TS_KEY)
            .await?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);
        if now - last > interval.as_secs() as i64 {
            self.store.set(TS_KEY, &now.to_string(), None).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Run `fut` under the system-wide refresh lock.
    ///
    /// Acquisition polls `add_if_absent` every 100 ms until a deadline
    /// equal to the lock TTL; past it the operation is skipped with
    /// [`LockOutcome::Contended`]. Once acquired, the operation runs under
    /// an execution ceiling equal to the same TTL and is abandoned past it.
    /// The lock is released on every exit path.
    pub async fn lock<F, T>(&self, fut: F) -> Result<LockOutcome<T>>
    where
        F: Future<Output = T>,
    {
        let deadline = Instant::now() + self.lock_ttl;
        loop {
            let stamp = Utc::now().timestamp().to_string();
            if self
                .store
                .add_if_absent(LOCK_KEY, &stamp, self.lock_ttl)
                .await?
            {
                break;
            }
            if Instant::now() >= deadline {
                return Ok(LockOutcome::Contended);
            }
            sleep(LOCK_RETRY_DELAY).await;
        }

        let result = timeout(self.lock_ttl, fut).await;

        if let Err(e) = self.store.delete(LOCK_KEY).await {
            warn!("Failed to release refresh lock: {e}");
        }

        match result {
            Ok(value) => Ok(LockOutcome::Completed(value)),
            Err(_) => Ok(LockOutcome::TimedOut),
        }
    }

    /// Fold `delta` into the daily items-added counters.
    ///
    /// `count_cur` accumulates within the day. Once per calendar day
    /// (detected by the `count_mark` key expiring at midnight, or by its
    /// day stamp rolling over on backends without expiry) the current
    /// total folds into the average as `(avg + cur) / 2` with integer
    /// division, seeding the average with the current total on the first
    /// fold, and `count_cur` resets to zero.
    pub async fn running_average(&self, delta: i64) -> Result<()> {
        let now = Utc::now();

        if self.store.get(COUNT_CUR_KEY).await?.is_some() {
            self.store.increment(COUNT_CUR_KEY, delta, 0).await?;

            let multi = self
                .store
                .get_multi(&[COUNT_AVG_KEY, COUNT_CUR_KEY, COUNT_MARK_KEY])
                .await?;
            // The filesystem backend keeps values past their TTL, so the
            // mark's own day stamp decides as well as its presence.
            let mark_is_today = multi
                .get(COUNT_MARK_KEY)
                .and_then(|raw| parse_epoch(raw))
                .map(|at| at.date_naive() == now.date_naive())
                .unwrap_or(false);
            if !mark_is_today {
                let cur = multi
                    .get(COUNT_CUR_KEY)
                    .and_then(|raw| raw.trim().parse::<i64>().ok())
                    .unwrap_or(0);
                let avg = multi
                    .get(COUNT_AVG_KEY)
                    .and_then(|raw| raw.trim().parse::<i64>().ok())
                    .unwrap_or(cur);
                self.store
                    .set_multi(
                        &[
                            (COUNT_AVG_KEY, ((avg + cur) / 2).to_string()),
                            (COUNT_CUR_KEY, "0".to_string()),
                        ],
                        None,
                    )
                    .await?;
            }
        } else {
            self.store
                .set(COUNT_CUR_KEY, &delta.to_string(), None)
                .await?;
        }

        self.store
            .set(
                COUNT_MARK_KEY,
                &now.timestamp().to_string(),
                Some(until_next_midnight(now)),
            )
            .await?;
        Ok(())
    }

    /// Best-effort statistics snapshot. Never fails: unknown values stay
    /// `None`.
    pub async fn stats(&self) -> Result<CacheStats> {
        let multi = self
            .store
            .get_multi(&[TS_KEY, UPD_KEY, DATA_KEY, COUNT_AVG_KEY, COUNT_CUR_KEY])
            .await?;

        let checked_at = multi.get(TS_KEY).and_then(|raw| parse_epoch(raw));
        let updated_at = multi.get(UPD_KEY).and_then(|raw| parse_epoch(raw));
        let item_count = multi
            .get(DATA_KEY)
            .and_then(|raw| serde_json::from_str::<Vec<Article>>(raw).ok())
            .map(|items| items.len());
        let byte_size = multi.get(DATA_KEY).map(|raw| raw.len());
        let daily_average = multi
            .get(COUNT_AVG_KEY)
            .or_else(|| multi.get(COUNT_CUR_KEY))
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        Ok(CacheStats {
            checked_at,
            updated_at,
            item_count,
            byte_size,
            daily_average,
        })
    }
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let secs = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Seconds remaining until the next UTC midnight, rounded up.
fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    let tomorrow = (now + chrono::Duration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    let secs = (tomorrow - now).num_seconds().max(1) as u64;
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cache() -> ContentCache {
        ContentCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(300))
    }

    fn article(url: &str) -> Article {
        Article {
            url: url.to_string(),
            title: format!("Стаття {url}"),
            description: "Опис".to_string(),
            content: "Текст".to_string(),
            content_full: None,
            published_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            source: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_get_empty_when_absent() {
        let cache = cache();
        assert!(cache.get().await.unwrap().is_empty());
        assert_eq!(cache.updated().await.unwrap(), None);
        assert_eq!(cache.page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_get_round_trip_preserves_order() {
        let cache = cache();
        let items = vec![article("u1"), article("u2"), article("u3")];
        let written = cache.put(&items, None).await.unwrap();
        assert_eq!(written, 3);

        let got = cache.get().await.unwrap();
        let urls: Vec<_> = got.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2", "u3"]);
        assert!(cache.updated().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_corrupt_data_reads_empty() {
        let cache = cache();
        cache.store().set("data", "not json {", None).await.unwrap();
        assert!(cache.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_renders_at_most_once() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let render = |items: &[Article]| {
            calls.fetch_add(1, Ordering::SeqCst);
            format!("<html>{}</html>", items.len())
        };
        cache.put(&[article("u1")], Some(&render)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.page().await.unwrap(), Some("<html>1</html>".to_string()));
    }

    #[tokio::test]
    async fn test_put_without_render_keeps_old_page() {
        let cache = cache();
        let render = |_: &[Article]| "<old/>".to_string();
        cache.put(&[article("u1")], Some(&render)).await.unwrap();
        cache.put(&[article("u2")], None).await.unwrap();
        assert_eq!(cache.page().await.unwrap(), Some("<old/>".to_string()));
    }

    #[tokio::test]
    async fn test_put_oversize_drops_oldest_until_fit() {
        // Each serialized article is well over 150 bytes; a 400-byte
        // ceiling forces the collection down before the write succeeds.
        let store = Arc::new(MemoryStore::with_max_value_size(400));
        let cache = ContentCache::new(store, Duration::from_secs(300));

        let items = vec![article("u1"), article("u2"), article("u3"), article("u4")];
        let written = cache.put(&items, None).await.unwrap();
        assert!(written < 4, "some items must have been dropped");
        assert!(written > 0, "a smaller prefix must have fit");

        // Only a prefix survives, never reordered
        let got = cache.get().await.unwrap();
        let urls: Vec<_> = got.iter().map(|a| a.url.as_str()).collect();
        let expected: Vec<_> = ["u1", "u2", "u3", "u4"][..written].to_vec();
        assert_eq!(urls, expected);
    }

    #[tokio::test]
    async fn test_check_refresh_due_idempotent_within_interval() {
        let cache = cache();
        let interval = Duration::from_secs(900);
        assert!(cache.check_refresh_due(interval).await.unwrap());
        assert!(!cache.check_refresh_due(interval).await.unwrap());
        assert!(!cache.check_refresh_due(interval).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_refresh_due_after_interval_elapses() {
        let cache = cache();
        let interval = Duration::from_secs(900);
        assert!(cache.check_refresh_due(interval).await.unwrap());

        // Backdate the recorded check beyond the interval
        let past = (Utc::now().timestamp() - 1000).to_string();
        cache.store().set("ts", &past, None).await.unwrap();
        assert!(cache.check_refresh_due(interval).await.unwrap());
        assert!(!cache.check_refresh_due(interval).await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_bodies_never_overlap() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(ContentCache::new(store, Duration::from_secs(10)));

        let busy = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let cache = cache.clone();
            let busy = busy.clone();
            let overlapped = overlapped.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .lock(async {
                        if busy.swap(true, Ordering::SeqCst) {
                            overlapped.store(true, Ordering::SeqCst);
                        }
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        busy.store(false, Ordering::SeqCst);
                        runs.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_completed());
        }
        assert!(!overlapped.load(Ordering::SeqCst));
        // The loser waits and then runs; it is never silently dropped
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lock_contended_when_held_elsewhere() {
        let store = Arc::new(MemoryStore::new());
        // Foreign holder with a long TTL
        store
            .add_if_absent("lock", "1", Duration::from_secs(60))
            .await
            .unwrap();

        let cache = ContentCache::new(store, Duration::from_millis(300));
        let outcome = cache.lock(async { 42 }).await.unwrap();
        assert!(matches!(outcome, LockOutcome::Contended));
    }

    #[tokio::test]
    async fn test_lock_timeout_releases_lock() {
        let store = Arc::new(MemoryStore::new());
        let cache = ContentCache::new(store.clone(), Duration::from_millis(100));

        let outcome = cache
            .lock(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
            })
            .await
            .unwrap();
        assert!(matches!(outcome, LockOutcome::TimedOut));
        // Released despite the forced abandonment
        assert_eq!(store.get("lock").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lock_released_on_completion() {
        let store = Arc::new(MemoryStore::new());
        let cache = ContentCache::new(store.clone(), Duration::from_secs(10));
        let outcome = cache.lock(async { "done" }).await.unwrap();
        assert!(outcome.is_completed());
        assert_eq!(store.get("lock").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_running_average_same_day_accumulates() {
        let cache = cache();
        cache.running_average(5).await.unwrap();
        cache.running_average(5).await.unwrap();

        assert_eq!(
            cache.store().get("count_cur").await.unwrap(),
            Some("10".to_string())
        );
        // No fold within the same day
        assert_eq!(cache.store().get("count_avg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_running_average_folds_after_day_boundary() {
        let cache = cache();
        cache.store().set("count_avg", "4", None).await.unwrap();
        cache.running_average(5).await.unwrap();
        cache.running_average(5).await.unwrap();

        // Simulate the midnight expiry of the day marker
        cache.store().delete("count_mark").await.unwrap();
        cache.running_average(0).await.unwrap();

        assert_eq!(
            cache.store().get("count_avg").await.unwrap(),
            Some("7".to_string()) // (4 + 10) / 2
        );
        assert_eq!(
            cache.store().get("count_cur").await.unwrap(),
            Some("0".to_string())
        );
        // Marker re-armed for the next boundary
        assert!(cache.store().get("count_mark").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_running_average_folds_when_mark_outlives_its_ttl() {
        let cache = cache();
        cache.store().set("count_avg", "4", None).await.unwrap();
        cache.running_average(10).await.unwrap();

        // A backend without expiry serves the mark forever; a stamp from
        // the previous day must still trigger the fold
        let yesterday = (Utc::now() - chrono::Duration::days(1))
            .timestamp()
            .to_string();
        cache.store().set("count_mark", &yesterday, None).await.unwrap();
        cache.running_average(0).await.unwrap();

        assert_eq!(
            cache.store().get("count_avg").await.unwrap(),
            Some("7".to_string()) // (4 + 10) / 2
        );
        assert_eq!(
            cache.store().get("count_cur").await.unwrap(),
            Some("0".to_string())
        );
    }

    #[tokio::test]
    async fn test_running_average_first_fold_seeds_with_current() {
        let cache = cache();
        cache.running_average(6).await.unwrap();
        cache.store().delete("count_mark").await.unwrap();
        cache.running_average(0).await.unwrap();

        // (6 + 6) / 2 with the average seeded from the current total
        assert_eq!(
            cache.store().get("count_avg").await.unwrap(),
            Some("6".to_string())
        );
    }

    #[tokio::test]
    async fn test_stats_best_effort() {
        let cache = cache();
        let empty = cache.stats().await.unwrap();
        assert_eq!(empty, CacheStats::default());

        cache.put(&[article("u1"), article("u2")], None).await.unwrap();
        cache.running_average(2).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert!(stats.updated_at.is_some());
        assert_eq!(stats.item_count, Some(2));
        assert!(stats.byte_size.unwrap() > 2);
        assert_eq!(stats.daily_average, Some(2));
    }

    #[tokio::test]
    async fn test_stats_with_corrupt_data() {
        let cache = cache();
        cache.store().set("data", "broken {", None).await.unwrap();
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.item_count, None);
        // Raw size is still known even when the JSON does not parse
        assert_eq!(stats.byte_size, Some(8));
    }

    #[test]
    fn test_until_next_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 30).unwrap();
        assert_eq!(until_next_midnight(now), Duration::from_secs(30));

        let start_of_day = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            until_next_midnight(start_of_day),
            Duration::from_secs(86400)
        );
    }
}
