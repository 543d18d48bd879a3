pub mod config;
pub mod migrate;
pub mod operations;

mod health_monitor;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::db::config::{DbConfig, DbConfigError};
use crate::db::health_monitor::{HealthCheckResult, HealthTracker};

pub use crate::db::health_monitor::HealthCheckSnapshot;

#[derive(Clone)]
pub struct DatabaseProxy {
    config: DbConfig,
    pool: PgPool,
    health: Arc<RwLock<HealthTracker>>,
}

impl DatabaseProxy {
    pub async fn from_env() -> Result<Arc<Self>, DbInitError> {
        let config = DbConfig::from_env()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.primary_url)
            .await
            .map_err(DbInitError::Sqlx)?;

        migrate::run_migrations(&pool).await?;

        let proxy = Arc::new(Self {
            health: Arc::new(RwLock::new(HealthTracker::new(config.health_check.clone()))),
            config,
            pool,
        });

        proxy.start_health_monitor();

        Ok(proxy)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.config.primary_url
    }

    pub async fn health_status(&self) -> HealthCheckSnapshot {
        let tracker = self.health.read().await;
        tracker.snapshot()
    }
}

impl DatabaseProxy {
    fn start_health_monitor(self: &Arc<Self>) {
        let proxy = Arc::clone(self);
        tokio::spawn(async move {
            proxy.health_monitor_loop().await;
        });
    }

    async fn health_monitor_loop(self: Arc<Self>) {
        let interval = self.config.health_check.interval;
        let timeout = self.config.health_check.timeout;

        loop {
            let start = tokio::time::Instant::now();
            let check = tokio::time::timeout(
                timeout,
                sqlx::query("SELECT 1").execute(&self.pool),
            )
            .await;

            let result = match check {
                Ok(Ok(_)) => HealthCheckResult::healthy(start.elapsed()),
                Ok(Err(err)) => HealthCheckResult::unhealthy(err.to_string()),
                Err(_) => HealthCheckResult::unhealthy("health check timed out".to_string()),
            };

            {
                let mut tracker = self.health.write().await;
                tracker.process(result);
                if tracker.is_degraded() {
                    warn!(
                        consecutive_failures = tracker.snapshot().consecutive_failures,
                        "database health degraded"
                    );
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error(transparent)]
    Config(#[from] DbConfigError),
    #[error(transparent)]
    Migration(#[from] migrate::MigrationError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}
