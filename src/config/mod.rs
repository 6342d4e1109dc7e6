//! Typed configuration from environment variables or TOML.
//!
//! Every value has a default, so an empty environment is valid. Values that
//! are present but malformed fail fast with [`Error::Config`].

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Tuning knobs of a [`TaskQueue`](crate::queue::TaskQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of items processed at the same time.
    pub concurrency_limit: NonZeroUsize,
    /// When true, draining to empty never closes the queue; only an explicit
    /// `close()` does.
    pub keep_alive: bool,
    /// Period of the background check that closes an idle, non-keep-alive
    /// queue.
    pub idle_check_interval: Duration,
    /// Polling period of `close()` while it waits for in-flight work.
    pub drain_poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: NonZeroUsize::MIN,
            keep_alive: false,
            idle_check_interval: Duration::from_millis(500),
            drain_poll_interval: Duration::from_millis(150),
        }
    }
}

/// `[queue]` table as written in TOML. Missing keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueueSection {
    concurrency_limit: Option<usize>,
    keep_alive: Option<bool>,
    idle_check_ms: Option<u64>,
    drain_poll_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct QueueFile {
    #[serde(default)]
    queue: QueueSection,
}

impl QueueConfig {
    /// Load from `ASYNCQ_*` environment variables.
    pub fn from_env() -> Result<Self> {
        QueueSection {
            concurrency_limit: optional_var("ASYNCQ_CONCURRENCY_LIMIT")?,
            keep_alive: optional_var("ASYNCQ_KEEP_ALIVE")?,
            idle_check_ms: optional_var("ASYNCQ_IDLE_CHECK_MS")?,
            drain_poll_ms: optional_var("ASYNCQ_DRAIN_POLL_MS")?,
        }
        .resolve()
    }

    /// Parse a document containing an optional `[queue]` table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: QueueFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad queue config: {e}")))?;
        file.queue.resolve()
    }
}

impl QueueSection {
    fn resolve(self) -> Result<QueueConfig> {
        let defaults = QueueConfig::default();
        let concurrency_limit = match self.concurrency_limit {
            Some(limit) => NonZeroUsize::new(limit)
                .ok_or_else(|| Error::Config("concurrency limit must be at least 1".to_string()))?,
            None => defaults.concurrency_limit,
        };
        Ok(QueueConfig {
            concurrency_limit,
            keep_alive: self.keep_alive.unwrap_or(defaults.keep_alive),
            idle_check_interval: self
                .idle_check_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_check_interval),
            drain_poll_interval: self
                .drain_poll_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.drain_poll_interval),
        })
    }
}

/// Process-level configuration for the `asyncq` binary.
#[derive(Debug)]
pub struct Config {
    pub queue: QueueConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            queue: QueueConfig::from_env()?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn optional_var<V>(name: &str) -> Result<Option<V>>
where
    V: FromStr,
    V::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
