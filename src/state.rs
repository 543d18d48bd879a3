use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::warn;

use crate::cache::CacheStore;
use crate::core::EventBus;
use crate::db::DatabaseProxy;
use crate::leaderboard::Leaderboard;
use crate::search::SearchIndex;
use crate::services::reviews::ReviewContext;

#[derive(Debug)]
pub struct RuntimeConfig {
    pub redis_enabled: AtomicBool,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            redis_enabled: AtomicBool::new(true),
        }
    }

    pub fn is_redis_enabled(&self) -> bool {
        self.redis_enabled.load(Ordering::Relaxed)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db_proxy: Option<Arc<DatabaseProxy>>,
    cache: Arc<CacheStore>,
    leaderboard: Arc<Leaderboard>,
    search: Arc<SearchIndex>,
    event_bus: Arc<EventBus>,
    runtime: Arc<RuntimeConfig>,
}

impl AppState {
    pub fn new(
        db_proxy: Option<Arc<DatabaseProxy>>,
        cache: Arc<CacheStore>,
        leaderboard: Arc<Leaderboard>,
        search: Arc<SearchIndex>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db_proxy,
            cache,
            leaderboard,
            search,
            event_bus: Arc::new(EventBus::new()),
            runtime: Arc::new(RuntimeConfig::new()),
        }
    }

    /// Builds the store set from the environment. Redis backs the
    /// leaderboard and flag cache when reachable; otherwise both degrade to
    /// the in-process variants with identical semantics.
    pub async fn from_env(db_proxy: Option<Arc<DatabaseProxy>>) -> Self {
        let redis_url = std::env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty());

        let (cache, leaderboard) = match redis_url {
            Some(url) => {
                let leaderboard = match Leaderboard::connect(&url).await {
                    Ok(store) => store,
                    Err(err) => {
                        warn!(error = %err, "redis unreachable, using in-memory leaderboard");
                        Leaderboard::memory()
                    }
                };
                let cache = match CacheStore::connect(&url).await {
                    Ok(store) => store,
                    Err(err) => {
                        warn!(error = %err, "redis unreachable, using in-memory cache");
                        CacheStore::memory()
                    }
                };
                (cache, leaderboard)
            }
            None => (CacheStore::memory(), Leaderboard::memory()),
        };

        Self::new(
            db_proxy,
            Arc::new(cache),
            Arc::new(leaderboard),
            Arc::new(SearchIndex::from_env()),
        )
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> Option<Arc<DatabaseProxy>> {
        self.db_proxy.clone()
    }

    pub fn cache(&self) -> Arc<CacheStore> {
        Arc::clone(&self.cache)
    }

    pub fn leaderboard(&self) -> Arc<Leaderboard> {
        Arc::clone(&self.leaderboard)
    }

    pub fn search(&self) -> Arc<SearchIndex> {
        Arc::clone(&self.search)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn runtime(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.runtime)
    }

    /// The full store bundle the review lifecycle needs, or None while the
    /// relational store is unavailable.
    pub fn review_context(&self) -> Option<ReviewContext> {
        let proxy = self.db_proxy.clone()?;
        Some(ReviewContext {
            proxy,
            leaderboard: Arc::clone(&self.leaderboard),
            search: Arc::clone(&self.search),
            cache: Arc::clone(&self.cache),
            events: Arc::clone(&self.event_bus),
        })
    }
}
