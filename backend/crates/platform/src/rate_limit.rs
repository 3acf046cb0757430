//! Rate Limiting Infrastructure
//!
//! - [`RateLimitStore`]: atomic consume-or-reject counter service
//! - [`MemoryRateLimitStore`]: single-process store (mutex-protected map)
//! - [`DailyRateLimiter`]: per-(route, identifier) daily quota with whitelist bypass
//!
//! Exhausting a quota blocks the key for a full window from the moment of
//! exhaustion. This is a hard daily cutoff, not a leaky bucket.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::client::is_placeholder;

/// One day, the window and block duration of [`DailyRateLimiter`]
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Identifier shared by every client whose identity is unknown
pub const ANONYMOUS: &str = "anonymous";

/// Buckets are swept once the map grows past this many keys
const SWEEP_THRESHOLD: usize = 10_000;

/// Result of a consume attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Consumption {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Consumption::Allowed { .. })
    }

    /// Seconds until the key unblocks, rounded up
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Consumption::Allowed { .. } => None,
            Consumption::Denied { retry_after } => {
                let secs = retry_after.as_secs();
                Some(if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs })
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    Store(String),
}

/// Atomic counter service
///
/// `consume` must increment and check in one step per key so that two
/// concurrent callers cannot both pass a quota with one slot left.
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    async fn consume(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<Consumption, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    consumed: u32,
    window_ends: Instant,
    blocked_until: Option<Instant>,
}

impl Bucket {
    fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            consumed: 0,
            window_ends: now + window,
            blocked_until: None,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        now >= self.window_ends && self.blocked_until.is_none_or(|until| now >= until)
    }
}

/// In-process store; state is lost on restart and not shared across instances
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one point for `key` as of `now`
    pub fn consume_at(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> Result<Consumption, RateLimitError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| RateLimitError::Store("bucket map lock poisoned".to_string()))?;

        if buckets.len() > SWEEP_THRESHOLD {
            buckets.retain(|_, bucket| !bucket.is_stale(now));
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::fresh(now, window));

        if let Some(until) = bucket.blocked_until {
            if now < until {
                return Ok(Consumption::Denied {
                    retry_after: until - now,
                });
            }
            *bucket = Bucket::fresh(now, window);
        }

        if now >= bucket.window_ends {
            *bucket = Bucket::fresh(now, window);
        }

        bucket.consumed = bucket.consumed.saturating_add(1);

        if bucket.consumed > limit {
            bucket.blocked_until = Some(now + window);
            tracing::debug!(key = %key, limit, "Rate limit bucket blocked");
            return Ok(Consumption::Denied {
                retry_after: window,
            });
        }

        Ok(Consumption::Allowed {
            remaining: limit - bucket.consumed,
        })
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn consume(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<Consumption, RateLimitError> {
        self.consume_at(key, limit, window, Instant::now())
    }
}

/// Daily quota per (route, limit) keyed by client identifier
#[derive(Debug)]
pub struct DailyRateLimiter<S> {
    store: S,
    whitelist: HashSet<String>,
}

impl<S> DailyRateLimiter<S>
where
    S: RateLimitStore,
{
    pub fn new(store: S, whitelist: impl IntoIterator<Item = String>) -> Self {
        let whitelist = whitelist
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
        Self { store, whitelist }
    }

    pub fn is_whitelisted(&self, identifier: Option<&str>) -> bool {
        match identifier {
            Some(id) if !is_placeholder(Some(id)) => self.whitelist.contains(id.trim()),
            _ => false,
        }
    }

    /// Consume one point of today's quota for `identifier` on `route`
    ///
    /// Whitelisted identifiers pass without consuming. Unknown identifiers
    /// share the [`ANONYMOUS`] bucket. A limit of zero is treated as one.
    pub async fn consume(
        &self,
        route: &str,
        identifier: Option<&str>,
        limit: u32,
    ) -> Result<Consumption, RateLimitError> {
        let limit = limit.max(1);

        if self.is_whitelisted(identifier) {
            return Ok(Consumption::Allowed { remaining: limit });
        }

        let identifier = match identifier {
            Some(id) if !is_placeholder(Some(id)) => id.trim(),
            _ => ANONYMOUS,
        };

        let key = format!("{route}:{limit}:{identifier}");
        self.store.consume(&key, limit, DAY).await
    }
}

/// Split a comma-separated whitelist setting
pub fn parse_whitelist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_exactly_limit_consumptions_succeed() {
        let store = MemoryRateLimitStore::new();
        let now = Instant::now();

        for expected_remaining in (0..3).rev() {
            assert_eq!(
                store.consume_at("k", 3, DAY, now).unwrap(),
                Consumption::Allowed {
                    remaining: expected_remaining
                }
            );
        }
        assert!(!store.consume_at("k", 3, DAY, now).unwrap().is_allowed());
    }

    #[test]
    fn test_block_lasts_a_full_window_from_exhaustion() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        assert!(store.consume_at("k", 1, DAY, start).unwrap().is_allowed());

        // Exhausted late in the window
        let late = start + DAY - Duration::from_secs(60);
        assert!(!store.consume_at("k", 1, DAY, late).unwrap().is_allowed());

        // The original window has ended but the block has not
        let after_window = start + DAY + Duration::from_secs(60);
        let res = store.consume_at("k", 1, DAY, after_window).unwrap();
        assert!(!res.is_allowed());

        // Block expires one day after exhaustion
        let after_block = late + DAY;
        assert!(store.consume_at("k", 1, DAY, after_block).unwrap().is_allowed());
    }

    #[test]
    fn test_window_resets_without_block() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        assert!(store.consume_at("k", 2, DAY, start).unwrap().is_allowed());
        let next_day = start + DAY;
        assert_eq!(
            store.consume_at("k", 2, DAY, next_day).unwrap(),
            Consumption::Allowed { remaining: 1 }
        );
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let denied = Consumption::Denied {
            retry_after: Duration::from_millis(1500),
        };
        assert_eq!(denied.retry_after_secs(), Some(2));
        assert_eq!(Consumption::Allowed { remaining: 1 }.retry_after_secs(), None);
    }

    #[tokio::test]
    async fn test_daily_limiter_keys_by_route_and_identifier() {
        let limiter = DailyRateLimiter::new(MemoryRateLimitStore::new(), Vec::new());

        assert!(limiter.consume("quiz:submit", Some("1.1.1.1"), 1).await.unwrap().is_allowed());
        assert!(!limiter.consume("quiz:submit", Some("1.1.1.1"), 1).await.unwrap().is_allowed());
        assert!(limiter.consume("quiz:start", Some("1.1.1.1"), 1).await.unwrap().is_allowed());
        assert!(limiter.consume("quiz:submit", Some("2.2.2.2"), 1).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_whitelisted_identifier_never_fails() {
        let limiter = DailyRateLimiter::new(
            MemoryRateLimitStore::new(),
            parse_whitelist(" 10.0.0.1 , ,10.0.0.2"),
        );

        for _ in 0..50 {
            let res = limiter.consume("quiz:submit", Some("10.0.0.1"), 2).await.unwrap();
            assert_eq!(res, Consumption::Allowed { remaining: 2 });
        }
    }

    #[tokio::test]
    async fn test_unknown_identifiers_share_anonymous_bucket() {
        let limiter = DailyRateLimiter::new(
            MemoryRateLimitStore::new(),
            vec!["unknown".to_string()],
        );

        assert!(limiter.consume("quiz:submit", None, 2).await.unwrap().is_allowed());
        assert!(limiter.consume("quiz:submit", Some("unknown"), 2).await.unwrap().is_allowed());
        assert!(!limiter.consume("quiz:submit", Some(""), 2).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_concurrent_consumers_respect_quota() {
        let limiter = Arc::new(DailyRateLimiter::new(MemoryRateLimitStore::new(), Vec::new()));
        let mut handles = Vec::new();
        for _ in 0..32 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .consume("quiz:submit", Some("3.3.3.3"), 5)
                    .await
                    .unwrap()
                    .is_allowed()
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }

    #[test]
    fn test_parse_whitelist() {
        assert_eq!(parse_whitelist("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_whitelist("").is_empty());
    }
}
