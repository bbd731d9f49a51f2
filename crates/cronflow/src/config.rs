use std::time::Duration;

use crate::jobs::QueueConfig;

// Config is the one place runtime knobs are read from the environment.
// Everything downstream gets typed values instead of raw strings.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub num_workers: usize,
    pub poll_interval_ms: u64,
    pub recurring_interval_secs: u64,
    pub migrate_on_startup: bool,
    pub db: DbConfig,
}

/// Connection pool settings.
#[derive(Clone, Debug)]
pub struct DbConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Issue `SET jit = OFF` on every new connection.
    pub disable_jit: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout: Duration::from_secs(10),
            disable_jit: true,
        }
    }
}

impl DbConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_connections = std::env::var("CRONFLOW_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_connections)
            .clamp(1, 64);

        let acquire_timeout = std::env::var("CRONFLOW_DB_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.clamp(1, 60)))
            .unwrap_or(defaults.acquire_timeout);

        Self {
            max_connections,
            acquire_timeout,
            disable_jit: env_bool("CRONFLOW_DISABLE_JIT").unwrap_or(defaults.disable_jit),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let num_workers = env_or_fallback("CRONFLOW_NUM_WORKERS", "JOB_QUEUE_NUM_WORKERS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(4);

        let poll_interval_ms = env_or_fallback("CRONFLOW_POLL_INTERVAL_MS", "POLL_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let recurring_interval_secs =
            env_or_fallback("CRONFLOW_RECURRING_INTERVAL_SECS", "RECURRING_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

        let migrate_on_startup = env_bool("CRONFLOW_MIGRATE_ON_STARTUP").unwrap_or(false);

        Ok(Self {
            database_url,
            num_workers,
            poll_interval_ms,
            recurring_interval_secs,
            migrate_on_startup,
            db: DbConfig::from_env(),
        })
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            num_workers: self.num_workers.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            recurring_interval: Duration::from_secs(self.recurring_interval_secs.max(1)),
        }
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
