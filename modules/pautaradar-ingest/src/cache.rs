//! Ephemeral counters and rings, Redis-backed with in-memory fallback.
//!
//! Holds rate-limit buckets, per-domain in-flight counters, circuit-breaker
//! state, and yield history rings. Every operation is best-effort: a missing
//! or failing Redis degrades to a per-process map and never blocks a fetch.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};

struct LocalEntry {
    value: i64,
    expires_at: Instant,
}

struct LocalList {
    items: VecDeque<String>,
    expires_at: Instant,
}

pub struct EphemeralCache {
    redis: Option<ConnectionManager>,
    counters: Mutex<HashMap<String, LocalEntry>>,
    lists: Mutex<HashMap<String, LocalList>>,
}

impl EphemeralCache {
    /// Connect to Redis when a URL is configured; otherwise run fully local.
    pub async fn connect(redis_url: &str) -> Self {
        let redis = if redis_url.is_empty() {
            None
        } else {
            match redis::Client::open(redis_url) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!("Connected to Redis for ephemeral counters");
                        Some(conn)
                    }
                    Err(e) => {
                        warn!(error = %e, "Redis unavailable; using in-memory counters");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Invalid REDIS_URL; using in-memory counters");
                    None
                }
            }
        };
        Self {
            redis,
            counters: Mutex::new(HashMap::new()),
            lists: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            redis: None,
            counters: Mutex::new(HashMap::new()),
            lists: Mutex::new(HashMap::new()),
        }
    }

    fn local_incr(&self, key: &str, delta: i64, ttl: Duration) -> i64 {
        let mut counters = self.counters.lock().expect("counter lock");
        let now = Instant::now();
        let entry = counters.entry(key.to_string()).or_insert(LocalEntry {
            value: 0,
            expires_at: now + ttl,
        });
        if entry.expires_at <= now {
            entry.value = 0;
            entry.expires_at = now + ttl;
        }
        entry.value = (entry.value + delta).max(0);
        entry.value
    }

    fn local_get(&self, key: &str) -> i64 {
        let counters = self.counters.lock().expect("counter lock");
        match counters.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => entry.value,
            _ => 0,
        }
    }

    fn local_del(&self, key: &str) {
        self.counters.lock().expect("counter lock").remove(key);
    }

    /// Increment a counter and (re-)arm its TTL. Returns the new value.
    pub async fn incr_expire(&self, key: &str, ttl: Duration) -> i64 {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<i64> = redis::pipe()
                .atomic()
                .incr(key, 1i64)
                .expire(key, ttl.as_secs() as i64)
                .ignore()
                .query_async(&mut conn)
                .await
                .map(|(value,): (i64,)| value);
            match result {
                Ok(value) => return value,
                Err(e) => warn!(key, error = %e, "Redis INCR failed; falling back to memory"),
            }
        }
        self.local_incr(key, 1, ttl)
    }

    /// Decrement, clamped at zero.
    pub async fn decr_floor(&self, key: &str) {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<i64> = conn.decr(key, 1i64).await;
            match result {
                Ok(value) if value < 0 => {
                    let _: redis::RedisResult<()> = conn.set(key, 0i64).await;
                    return;
                }
                Ok(_) => return,
                Err(e) => warn!(key, error = %e, "Redis DECR failed; falling back to memory"),
            }
        }
        self.local_incr(key, -1, Duration::from_secs(60));
    }

    pub async fn delete(&self, key: &str) {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<()> = conn.del(key).await;
            if let Err(e) = result {
                warn!(key, error = %e, "Redis DEL failed; falling back to memory");
            } else {
                return;
            }
        }
        self.local_del(key);
    }

    /// Set a marker key with a TTL.
    pub async fn set_flag(&self, key: &str, ttl: Duration) {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<()> =
                conn.set_ex(key, 1i64, ttl.as_secs()).await;
            if let Err(e) = result {
                warn!(key, error = %e, "Redis SETEX failed; falling back to memory");
            } else {
                return;
            }
        }
        let mut counters = self.counters.lock().expect("counter lock");
        counters.insert(
            key.to_string(),
            LocalEntry { value: 1, expires_at: Instant::now() + ttl },
        );
    }

    pub async fn flag_set(&self, key: &str) -> bool {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<bool> = conn.exists(key).await;
            match result {
                Ok(exists) => return exists,
                Err(e) => warn!(key, error = %e, "Redis EXISTS failed; falling back to memory"),
            }
        }
        self.local_get(key) > 0
    }

    pub async fn counter(&self, key: &str) -> i64 {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<Option<i64>> = conn.get(key).await;
            match result {
                Ok(value) => return value.unwrap_or(0),
                Err(e) => warn!(key, error = %e, "Redis GET failed; falling back to memory"),
            }
        }
        self.local_get(key)
    }

    /// Append to a bounded ring with a TTL.
    pub async fn ring_push(&self, key: &str, value: &str, max_len: usize, ttl: Duration) {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<()> = redis::pipe()
                .rpush(key, value)
                .ignore()
                .ltrim(key, -(max_len as isize), -1)
                .ignore()
                .expire(key, ttl.as_secs() as i64)
                .ignore()
                .query_async(&mut conn)
                .await;
            if let Err(e) = result {
                warn!(key, error = %e, "Redis RPUSH failed; falling back to memory");
            } else {
                return;
            }
        }
        let mut lists = self.lists.lock().expect("list lock");
        let now = Instant::now();
        let list = lists.entry(key.to_string()).or_insert(LocalList {
            items: VecDeque::new(),
            expires_at: now + ttl,
        });
        if list.expires_at <= now {
            list.items.clear();
        }
        list.expires_at = now + ttl;
        list.items.push_back(value.to_string());
        while list.items.len() > max_len {
            list.items.pop_front();
        }
    }

    pub async fn ring_all(&self, key: &str) -> Vec<String> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            let result: redis::RedisResult<Vec<String>> = conn.lrange(key, 0, -1).await;
            match result {
                Ok(items) => return items,
                Err(e) => warn!(key, error = %e, "Redis LRANGE failed; falling back to memory"),
            }
        }
        let lists = self.lists.lock().expect("list lock");
        match lists.get(key) {
            Some(list) if list.expires_at > Instant::now() => {
                list.items.iter().cloned().collect()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_increment_and_expire() {
        let cache = EphemeralCache::in_memory();
        assert_eq!(cache.incr_expire("k", Duration::from_secs(60)).await, 1);
        assert_eq!(cache.incr_expire("k", Duration::from_secs(60)).await, 2);
        assert_eq!(cache.counter("k").await, 2);
        cache.decr_floor("k").await;
        assert_eq!(cache.counter("k").await, 1);
        cache.delete("k").await;
        assert_eq!(cache.counter("k").await, 0);
    }

    #[tokio::test]
    async fn decrement_never_goes_negative() {
        let cache = EphemeralCache::in_memory();
        cache.decr_floor("empty").await;
        assert_eq!(cache.counter("empty").await, 0);
    }

    #[tokio::test]
    async fn flags_round_trip() {
        let cache = EphemeralCache::in_memory();
        assert!(!cache.flag_set("open").await);
        cache.set_flag("open", Duration::from_secs(60)).await;
        assert!(cache.flag_set("open").await);
    }

    #[tokio::test]
    async fn ring_is_bounded() {
        let cache = EphemeralCache::in_memory();
        for i in 0..10 {
            cache.ring_push("ring", &format!("v{i}"), 3, Duration::from_secs(60)).await;
        }
        let items = cache.ring_all("ring").await;
        assert_eq!(items, vec!["v7", "v8", "v9"]);
    }
}
