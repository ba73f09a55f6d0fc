//! Per-entity snapshot cache with staleness tracking.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Cached<T> {
    snapshot: T,
    fetched_at: Instant,
}

/// Last good snapshot for one tracked entity (a city or a stop).
///
/// Snapshot and fetch time live in one `Option`, so "has data" and
/// "has a fetch time" cannot disagree and are always replaced together.
#[derive(Debug, Clone)]
pub struct EntityCache<T> {
    key: String,
    cached: Option<Cached<T>>,
    last_attempt: Option<Instant>,
}

impl<T> EntityCache<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cached: None,
            last_attempt: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn has_data(&self) -> bool {
        self.cached.is_some()
    }

    pub fn snapshot(&self) -> Option<&T> {
        self.cached.as_ref().map(|c| &c.snapshot)
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.cached.as_ref().map(|c| c.fetched_at)
    }

    /// True if never fetched or older than `threshold` at `now`.
    pub fn needs_refresh(&self, now: Instant, threshold: Duration) -> bool {
        match &self.cached {
            None => true,
            Some(c) => now.saturating_duration_since(c.fetched_at) > threshold,
        }
    }

    /// Record a fetch attempt, successful or not.
    pub fn mark_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    /// Stale by `threshold`, and the last attempt (if any) is at least
    /// `retry_floor` old. A failing entity stays stale but is not retried
    /// on every tick.
    pub fn is_due(&self, now: Instant, threshold: Duration, retry_floor: Duration) -> bool {
        self.needs_refresh(now, threshold)
            && self
                .last_attempt
                .map_or(true, |last| now.saturating_duration_since(last) >= retry_floor)
    }

    /// Record a successful fetch. Never called for failed fetches.
    pub fn commit(&mut self, snapshot: T, now: Instant) {
        self.cached = Some(Cached {
            snapshot,
            fetched_at: now,
        });
    }
}

/// First index in round-robin order from `cursor` for which `is_stale` holds.
pub(crate) fn first_stale(len: usize, cursor: usize, is_stale: impl Fn(usize) -> bool) -> Option<usize> {
    (0..len).map(|i| (cursor + i) % len).find(|&i| is_stale(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_MIN: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn test_needs_refresh_when_never_fetched() {
        let cache: EntityCache<u32> = EntityCache::new("Barcelona");
        assert!(!cache.has_data());
        assert!(cache.fetched_at().is_none());
        assert!(cache.needs_refresh(Instant::now(), TEN_MIN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_after_commit_stale_after_threshold() {
        let mut cache = EntityCache::new("Girona");
        let t0 = Instant::now();
        cache.commit(7u32, t0);

        assert!(cache.has_data());
        assert_eq!(cache.snapshot(), Some(&7));
        assert!(!cache.needs_refresh(t0, TEN_MIN));
        // Exactly at the threshold is still fresh.
        assert!(!cache.needs_refresh(t0 + TEN_MIN, TEN_MIN));
        assert!(cache.needs_refresh(t0 + TEN_MIN + Duration::from_millis(1), TEN_MIN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_replaces_snapshot_and_time_together() {
        let mut cache = EntityCache::new("Lleida");
        let t0 = Instant::now();
        cache.commit(1u32, t0);
        let t1 = t0 + Duration::from_secs(30);
        cache.commit(2u32, t1);

        assert_eq!(cache.snapshot(), Some(&2));
        assert_eq!(cache.fetched_at(), Some(t1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_waits_for_retry_floor() {
        let mut cache: EntityCache<u32> = EntityCache::new("Broken");
        let t0 = Instant::now();
        let retry = Duration::from_secs(60);
        assert!(cache.is_due(t0, TEN_MIN, retry));

        cache.mark_attempt(t0);
        assert!(cache.needs_refresh(t0, TEN_MIN));
        assert!(!cache.is_due(t0 + Duration::from_secs(59), TEN_MIN, retry));
        assert!(cache.is_due(t0 + retry, TEN_MIN, retry));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entity_is_never_due() {
        let mut cache = EntityCache::new("Girona");
        let t0 = Instant::now();
        cache.mark_attempt(t0);
        cache.commit(1u32, t0);
        assert!(!cache.is_due(t0 + Duration::from_secs(120), TEN_MIN, Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_stale_wraps_from_cursor() {
        let now = Instant::now();
        let mut caches: Vec<EntityCache<u32>> =
            (0..4).map(|i| EntityCache::new(format!("c{i}"))).collect();
        caches[0].commit(0, now);
        caches[2].commit(0, now);
        caches[3].commit(0, now);

        let stale = |c: &[EntityCache<u32>], i: usize| c[i].needs_refresh(now, TEN_MIN);

        assert_eq!(first_stale(caches.len(), 0, |i| stale(&caches, i)), Some(1));
        assert_eq!(first_stale(caches.len(), 2, |i| stale(&caches, i)), Some(1));

        caches[1].commit(0, now);
        assert_eq!(first_stale(caches.len(), 3, |i| stale(&caches, i)), None);
        assert_eq!(first_stale(0, 0, |_| true), None);
    }
}
