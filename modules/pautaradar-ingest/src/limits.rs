//! Fetch preflight limits: per-source rate limit, per-domain concurrency,
//! and a per-source circuit breaker. All counters live in the ephemeral
//! cache; a lost counter only means one extra request, never a stuck source.

use std::time::Duration;

use crate::cache::EphemeralCache;

const RATE_BUCKET_TTL: Duration = Duration::from_secs(90);
const BREAKER_FAILS_TTL: Duration = Duration::from_secs(300);
const BREAKER_OPEN_TTL: Duration = Duration::from_secs(120);
const BREAKER_THRESHOLD: i64 = 5;

fn rate_key(source_pk: i64, minute_epoch: i64) -> String {
    format!("radar:rate:{source_pk}:{minute_epoch}")
}

fn domain_key(domain: &str) -> String {
    format!("radar:dom:{domain}")
}

fn fails_key(source_pk: i64) -> String {
    format!("radar:cb:fails:{source_pk}")
}

fn open_key(source_pk: i64) -> String {
    format!("radar:cb:open:{source_pk}")
}

pub struct Limiter<'a> {
    cache: &'a EphemeralCache,
}

impl<'a> Limiter<'a> {
    pub fn new(cache: &'a EphemeralCache) -> Self {
        Self { cache }
    }

    /// Count this request against the source's minute bucket. Exactly
    /// `rate_per_min` requests pass in a minute; the next one is refused.
    pub async fn check_rate(&self, source_pk: i64, rate_per_min: u32, now_epoch_s: i64) -> bool {
        let bucket = now_epoch_s / 60;
        let count = self.cache.incr_expire(&rate_key(source_pk, bucket), RATE_BUCKET_TTL).await;
        count <= rate_per_min as i64
    }

    /// Reserve a per-domain in-flight slot. Must be paired with
    /// [`Limiter::release_domain`] in the fetcher's cleanup path.
    pub async fn acquire_domain(&self, domain: &str, cap: u32, timeout_s: u64) -> bool {
        let ttl = Duration::from_secs(timeout_s + 5);
        let in_flight = self.cache.incr_expire(&domain_key(domain), ttl).await;
        if in_flight > cap as i64 {
            self.cache.decr_floor(&domain_key(domain)).await;
            return false;
        }
        true
    }

    pub async fn release_domain(&self, domain: &str) {
        self.cache.decr_floor(&domain_key(domain)).await;
    }

    pub async fn breaker_open(&self, source_pk: i64) -> bool {
        self.cache.flag_set(&open_key(source_pk)).await
    }

    /// One more failure; opens the breaker at the threshold.
    pub async fn record_failure(&self, source_pk: i64) {
        let fails = self.cache.incr_expire(&fails_key(source_pk), BREAKER_FAILS_TTL).await;
        if fails >= BREAKER_THRESHOLD {
            self.cache.set_flag(&open_key(source_pk), BREAKER_OPEN_TTL).await;
        }
    }

    /// Success or 304: the failure streak resets.
    pub async fn record_success(&self, source_pk: i64) {
        self.cache.delete(&fails_key(source_pk)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limit_allows_exactly_the_budget() {
        let cache = EphemeralCache::in_memory();
        let limiter = Limiter::new(&cache);
        let now = 1_700_000_000;
        assert!(limiter.check_rate(1, 2, now).await);
        assert!(limiter.check_rate(1, 2, now + 1).await);
        assert!(!limiter.check_rate(1, 2, now + 2).await);
        // A new minute bucket resets the budget.
        assert!(limiter.check_rate(1, 2, now + 60).await);
    }

    #[tokio::test]
    async fn domain_concurrency_caps_in_flight() {
        let cache = EphemeralCache::in_memory();
        let limiter = Limiter::new(&cache);
        assert!(limiter.acquire_domain("example.org", 1, 30).await);
        assert!(!limiter.acquire_domain("example.org", 1, 30).await);
        limiter.release_domain("example.org").await;
        assert!(limiter.acquire_domain("example.org", 1, 30).await);
    }

    #[tokio::test]
    async fn rejected_acquire_does_not_leak_a_slot() {
        let cache = EphemeralCache::in_memory();
        let limiter = Limiter::new(&cache);
        assert!(limiter.acquire_domain("g1.example", 2, 30).await);
        assert!(limiter.acquire_domain("g1.example", 2, 30).await);
        assert!(!limiter.acquire_domain("g1.example", 2, 30).await);
        limiter.release_domain("g1.example").await;
        assert!(limiter.acquire_domain("g1.example", 2, 30).await);
    }

    #[tokio::test]
    async fn breaker_opens_after_five_failures_and_resets_on_success() {
        let cache = EphemeralCache::in_memory();
        let limiter = Limiter::new(&cache);
        for _ in 0..4 {
            limiter.record_failure(7).await;
        }
        assert!(!limiter.breaker_open(7).await);
        limiter.record_failure(7).await;
        assert!(limiter.breaker_open(7).await);

        // Success clears the streak; the open flag rides out its own TTL.
        limiter.record_success(7).await;
        assert_eq!(cache.counter(&fails_key(7)).await, 0);
    }
}
