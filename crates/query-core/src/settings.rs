//! Per-query execution settings
//!
//! Settings are plain values: every layer that needs different settings
//! derives a modified copy instead of mutating the one it was handed.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Execution limits applied to a whole query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Overall execution-time budget in milliseconds (0 = unlimited)
    pub max_execution_time_ms: u64,
    /// Maximum rows a participant may read (0 = unlimited)
    pub max_rows_to_read: u64,
    /// Maximum rows a participant may return (0 = unlimited)
    pub max_result_rows: u64,
}

impl Limits {
    /// Execution-time budget, if one is set
    pub fn max_execution_time(&self) -> Option<Duration> {
        match self.max_execution_time_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Settings carried with a query to every executor that runs it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum rows per produced block
    pub max_block_size: usize,
    /// Maximum worker threads per query
    pub max_threads: usize,
    /// Maximum simultaneous connections per shard pool
    pub max_distributed_connections: usize,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Send timeout in milliseconds
    pub send_timeout_ms: u64,
    /// Receive timeout in milliseconds
    pub receive_timeout_ms: u64,
    /// How long to wait for a free connection in a pool, in milliseconds
    pub queue_max_wait_ms: u64,
    /// Set once a distributed table has rewritten the query, so nested
    /// distributed tables leave it alone
    pub skip_query_rewrite: bool,
    /// Execution limits
    pub limits: Limits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_block_size: 65536,
            max_threads: 8,
            max_distributed_connections: 100,
            connect_timeout_ms: 10_000,
            send_timeout_ms: 300_000,
            receive_timeout_ms: 300_000,
            queue_max_wait_ms: 5_000,
            skip_query_rewrite: false,
            limits: Limits::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| QueryError::ConfigError(format!("invalid settings: {}", e)))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn queue_max_wait(&self) -> Duration {
        Duration::from_millis(self.queue_max_wait_ms)
    }

    /// Set the execution-time budget
    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.limits.max_execution_time_ms = limit.as_millis() as u64;
        self
    }

    /// Set the pool wait time
    pub fn with_queue_max_wait(mut self, wait: Duration) -> Self {
        self.queue_max_wait_ms = wait.as_millis() as u64;
        self
    }
}
