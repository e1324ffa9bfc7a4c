// SPDX-License-Identifier: MIT

//! Daemon configuration, loaded entirely from the environment. Every knob
//! has a default so a bare `esd` works against a local Postgres/Redis
//! without any env file.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub default_timezone: String,
    pub promote_interval: Duration,
    pub promote_lookahead: chrono::Duration,
    pub promote_batch_size: usize,
    pub sync_interval: Duration,
    pub dispatch_poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env_or("DATABASE_URL", "postgres://localhost/events"),
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            default_timezone: env_or("DEFAULT_TIMEZONE", es_core::DEFAULT_TIMEZONE),
            promote_interval: Duration::from_millis(env_millis("SCHEDULE_PROMOTE_INTERVAL_MS", 5_000)),
            promote_lookahead: chrono::Duration::milliseconds(env_millis("SCHEDULE_PROMOTE_LOOKAHEAD_MS", 1_000) as i64),
            promote_batch_size: env_millis("SCHEDULE_PROMOTE_BATCH_SIZE", 50) as usize,
            sync_interval: Duration::from_millis(env_millis("SCHEDULE_SYNC_INTERVAL_MS", 60_000)),
            dispatch_poll_interval: Duration::from_millis(env_millis("DISPATCH_POLL_INTERVAL_MS", 250)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_millis(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
