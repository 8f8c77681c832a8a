use super::parse_var;
use crate::core::{AppError, Result};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::env;
use std::time::Duration;

/// MySQL pool settings for the payments store
///
/// The pool is shared by request handlers and task workers, so
/// `max_connections` should cover `SERVER_WORKERS` plus `TASK_WORKERS`.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Connections kept open while idle
    pub min_connections: u32,
    pub max_connections: u32,
    /// How long a request or task waits for a free connection
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Configuration("DATABASE_URL not set".to_string()))?,
            min_connections: parse_var("DATABASE_MIN_CONNECTIONS", "2")?,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "20")?,
            acquire_timeout_secs: parse_var("DATABASE_ACQUIRE_TIMEOUT_SECS", "10")?,
            idle_timeout_secs: parse_var("DATABASE_IDLE_TIMEOUT_SECS", "600")?,
            max_lifetime_secs: parse_var("DATABASE_MAX_LIFETIME_SECS", "1800")?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(AppError::Configuration(
                "DATABASE_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(AppError::Configuration(format!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                self.min_connections, self.max_connections
            )));
        }

        if self.acquire_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    fn pool_options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout())
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .test_before_acquire(true)
    }

    /// Connect the payments pool
    pub async fn create_pool(&self) -> Result<MySqlPool> {
        let pool = self
            .pool_options()
            .connect(&self.url)
            .await
            .map_err(AppError::Database)?;

        tracing::debug!(
            min_connections = self.min_connections,
            max_connections = self.max_connections,
            acquire_timeout_secs = self.acquire_timeout_secs,
            "Payments pool connected"
        );

        Ok(pool)
    }
}
