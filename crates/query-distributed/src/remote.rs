//! Remote executor interface

use crate::cluster::ConnectionPool;
use crate::external::ExternalTables;
use crate::types::QueryId;
use query_core::{BlockStream, ProcessingStage, Settings};
use std::sync::Arc;

/// Everything a shard needs to run its part of a read
#[derive(Debug, Clone)]
pub struct RemoteQuery {
    pub query_id: QueryId,
    /// Rewritten query in canonical text form
    pub query: String,
    pub settings: Settings,
    /// Temporary tables visible to the query on the shard
    pub external_tables: ExternalTables,
    pub stage: ProcessingStage,
}

/// Runs a query on one shard.
///
/// `open` must not touch the network. Connecting, sending and receiving all
/// happen when the returned stream is consumed, and failures along the way
/// are reported as stream items.
pub trait RemoteExecutor: Send + Sync {
    fn open(&self, pool: Arc<ConnectionPool>, query: RemoteQuery) -> Box<dyn BlockStream>;
}
