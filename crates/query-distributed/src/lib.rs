//! Distributed tables
//!
//! A distributed table maps a logical table onto a physical table that
//! exists on every shard of a cluster. Reading it rewrites the query for the
//! physical table and fans it out as one lazy stream per participant.
//!
//! # Architecture
//!
//! - **Cluster**: ordered shard connection pools plus the number of shards
//!   served in-process
//! - **Rewriter**: retargets a SELECT at the physical table
//! - **External tables**: temporary tables shipped with a single read
//! - **DistributedTable**: the read coordinator and schema alteration
//! - **Remote executor**: runs a query on one shard, over Arrow Flight by
//!   default
//!
//! # Example
//!
//! ```ignore
//! use query_distributed::{ClusterHandle, ClusterRegistry, ClustersConfig, DistributedTable, TableDefinition};
//!
//! let config = ClustersConfig::from_file(Path::new("clusters.json"))?;
//! let registry = ClusterRegistry::from_config(&config, &settings)?;
//!
//! let table = DistributedTable::new(
//!     TableDefinition::new("hits", schema, "default", "hits_local"),
//!     registry.handle("logs")?,
//!     context,
//! )?;
//!
//! let result = table.read(&columns, &query, &settings, 65536, 8)?;
//! for stream in result.streams { /* merge */ }
//! ```

pub mod alter;
pub mod cluster;
pub mod config;
pub mod error;
pub mod external;
pub mod flight_transport;
pub mod network;
pub mod remote;
pub mod rewriter;
pub mod stream;
pub mod table;
pub mod types;

// Re-exports
pub use alter::apply_alter_commands;
pub use cluster::{
    saturate, Cluster, ClusterHandle, ClusterRegistry, ConnectionPool, ConnectionTimeouts,
    PoolEntry,
};
pub use config::{ClusterConfig, ClustersConfig, ReplicaAddress, ShardConfig};
pub use error::{DistributedError, Result};
pub use external::ExternalTables;
pub use flight_transport::{FlightBlockStream, FlightRemoteExecutor};
pub use network::{RemoteQueryTicket, SerializedTable};
pub use remote::{RemoteExecutor, RemoteQuery};
pub use rewriter::rewrite_query;
pub use stream::{BlockInputStream, LocalBlockInputStream, RemoteBlockInputStream};
pub use table::{DistributedTable, TableDefinition};
pub use types::{QueryId, ReadResult};
