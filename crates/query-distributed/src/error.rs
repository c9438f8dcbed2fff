//! Error types for distributed reads

use query_core::QueryError;
use thiserror::Error;

/// Errors that can occur while setting up or running a distributed read
#[derive(Error, Debug)]
pub enum DistributedError {
    /// The query is not of the kind the operation accepts
    #[error("Unsupported query: expected {expected}, found {found}")]
    UnsupportedQuery { expected: String, found: String },

    /// Cluster not found in the registry
    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    /// Invalid cluster or settings configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid distributed table definition
    #[error("Invalid table definition: {0}")]
    InvalidTable(String),

    /// A shard pool has no replicas to connect to
    #[error("No replicas available for shard {0}")]
    NoReplicas(usize),

    /// Waited too long for a free connection
    #[error("Timed out after {waited_ms}ms waiting for a connection to shard {shard}")]
    PoolTimeout { shard: usize, waited_ms: u64 },

    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Query engine error
    #[error("Query engine error: {0}")]
    QueryError(#[from] QueryError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for distributed operations
pub type Result<T> = std::result::Result<T, DistributedError>;

impl From<DistributedError> for QueryError {
    fn from(err: DistributedError) -> Self {
        match err {
            DistributedError::QueryError(inner) => inner,
            DistributedError::IoError(inner) => QueryError::IoError(inner),
            DistributedError::ConfigError(msg) => QueryError::ConfigError(msg),
            other => QueryError::RemoteError(other.to_string()),
        }
    }
}
