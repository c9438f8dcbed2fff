//! Core types for distributed reads

use query_core::ProcessingStage;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::stream::BlockInputStream;

/// Unique identifier for one distributed read, shared by all its streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub Uuid);

impl QueryId {
    /// Create a new random query ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query-{}", &self.0.to_string()[..8])
    }
}

/// Outcome of a distributed read: one lazy stream per participant and the
/// stage those streams stop at
pub struct ReadResult {
    /// Remote streams in shard order, then local streams
    pub streams: Vec<BlockInputStream>,
    pub stage: ProcessingStage,
}

impl ReadResult {
    pub fn remote_count(&self) -> usize {
        self.streams.iter().filter(|s| s.is_remote()).count()
    }

    pub fn local_count(&self) -> usize {
        self.streams.len() - self.remote_count()
    }
}

impl fmt::Debug for ReadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadResult")
            .field("streams", &self.streams.len())
            .field("stage", &self.stage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_id_display() {
        let id = QueryId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("query-"));
        assert_eq!(shown.len(), "query-".len() + 8);
        assert_ne!(id, QueryId::new());
    }
}
