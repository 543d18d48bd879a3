pub mod keys;

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

const TTL_JITTER_RATIO: f64 = 0.1;

/// Small JSON value cache over either redis or process memory. Cache
/// failures are swallowed; nothing here is a source of truth.
pub enum CacheStore {
    Redis(RedisCache),
    Memory(MemoryCache),
}

impl CacheStore {
    pub fn memory() -> Self {
        CacheStore::Memory(MemoryCache::new())
    }

    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        Ok(CacheStore::Redis(RedisCache::connect(redis_url).await?))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self {
            CacheStore::Redis(cache) => cache.get(key).await,
            CacheStore::Memory(cache) => cache.get(key),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match self {
            CacheStore::Redis(cache) => cache.set(key, value, ttl).await,
            CacheStore::Memory(cache) => cache.set(key, value),
        }
    }

    /// Reads and deletes in one step. The single consumer of a key gets the
    /// value at most once, concurrent takers included.
    pub async fn take<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self {
            CacheStore::Redis(cache) => cache.take(key).await,
            CacheStore::Memory(cache) => cache.take(key),
        }
    }

    pub async fn delete(&self, key: &str) {
        match self {
            CacheStore::Redis(cache) => cache.delete(key).await,
            CacheStore::Memory(cache) => cache.delete(key),
        }
    }

    pub async fn is_connected(&self) -> bool {
        match self {
            CacheStore::Redis(cache) => cache.is_connected().await,
            CacheStore::Memory(_) => true,
        }
    }
}

#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_tokio_connection().await?;
        Ok(Self::new(connection))
    }

    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn.get(key).await.ok()?;
        payload.and_then(|p| serde_json::from_str(&p).ok())
    }

    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize,
    {
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(_) => return,
        };
        let mut conn = self.connection.clone();

        if !ttl.is_zero() {
            let ttl = apply_ttl_jitter(ttl);
            let ttl_secs = ttl.as_secs().max(1);
            let _: Result<(), _> = conn.set_ex(key, payload, ttl_secs).await;
        } else {
            let _: Result<(), _> = conn.set(key, payload).await;
        }
    }

    pub async fn take<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn.get_del(key).await.ok()?;
        payload.and_then(|p| serde_json::from_str(&p).ok())
    }

    pub async fn delete(&self, key: &str) {
        let mut conn = self.connection.clone();
        let _: Result<u64, _> = conn.del(key).await;
    }

    pub async fn is_connected(&self) -> bool {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

/// Process-local fallback used by tests and redis-less deployments. TTLs are
/// not enforced; entries live as long as the process.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .and_then(|payload| serde_json::from_str(payload).ok())
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(payload) = serde_json::to_string(value) {
            self.entries.lock().insert(key.to_string(), payload);
        }
    }

    pub fn take<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.entries.lock().remove(key)?;
        serde_json::from_str(&payload).ok()
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

fn apply_ttl_jitter(ttl: Duration) -> Duration {
    let base_ms = ttl.as_millis() as f64;
    let mut rng = rand::rng();
    let factor = rng.random_range(1.0 - TTL_JITTER_RATIO..=1.0 + TTL_JITTER_RATIO);
    let jittered_ms = (base_ms * factor).round().max(1.0);
    Duration::from_millis(jittered_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Flag {
        is_first: bool,
        written: bool,
    }

    #[tokio::test]
    async fn take_consumes_exactly_once() {
        let cache = CacheStore::memory();
        cache
            .set(
                "review:written:7",
                &Flag {
                    is_first: true,
                    written: true,
                },
                Duration::ZERO,
            )
            .await;

        let first: Option<Flag> = cache.take("review:written:7").await;
        assert_eq!(
            first,
            Some(Flag {
                is_first: true,
                written: true
            })
        );

        let second: Option<Flag> = cache.take("review:written:7").await;
        assert_eq!(second, None);
    }
}
