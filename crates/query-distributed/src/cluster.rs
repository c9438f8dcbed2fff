//! Cluster model
//!
//! A [`Cluster`] is an ordered list of shard connection pools plus the number
//! of shards this node serves itself. Shard order never changes once the
//! cluster is built, so stream order of a distributed read is stable.

use crate::config::{ClusterConfig, ClustersConfig, ReplicaAddress};
use crate::error::{DistributedError, Result};
use parking_lot::RwLock;
use query_core::Settings;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Clamp `requested` to `limit` when a limit is set
pub fn saturate(requested: Duration, limit: Option<Duration>) -> Duration {
    match limit {
        Some(limit) => requested.min(limit),
        None => requested,
    }
}

/// Network timeouts for connections of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    pub connect: Duration,
    pub send: Duration,
    pub receive: Duration,
}

impl ConnectionTimeouts {
    /// Timeouts from `settings`, none exceeding the execution-time limit
    pub fn from_settings(settings: &Settings) -> Self {
        let limit = settings.limits.max_execution_time();
        Self {
            connect: saturate(settings.connect_timeout(), limit),
            send: saturate(settings.send_timeout(), limit),
            receive: saturate(settings.receive_timeout(), limit),
        }
    }
}

/// Bounded set of connections to the replicas of one shard
#[derive(Debug)]
pub struct ConnectionPool {
    shard_num: usize,
    replicas: Vec<ReplicaAddress>,
    timeouts: ConnectionTimeouts,
    max_connections: usize,
    slots: Arc<Semaphore>,
    next_replica: AtomicUsize,
}

impl ConnectionPool {
    pub fn new(
        shard_num: usize,
        replicas: Vec<ReplicaAddress>,
        timeouts: ConnectionTimeouts,
        max_connections: usize,
    ) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            shard_num,
            replicas,
            timeouts,
            max_connections,
            slots: Arc::new(Semaphore::new(max_connections)),
            next_replica: AtomicUsize::new(0),
        }
    }

    /// 1-based position of the shard in its cluster's configuration
    pub fn shard_num(&self) -> usize {
        self.shard_num
    }

    pub fn replicas(&self) -> &[ReplicaAddress] {
        &self.replicas
    }

    pub fn timeouts(&self) -> ConnectionTimeouts {
        self.timeouts
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Connections that can be checked out right now
    pub fn available_connections(&self) -> usize {
        self.slots.available_permits()
    }

    /// Take a connection slot, waiting at most `wait` for one to free up.
    ///
    /// Replicas are handed out round-robin.
    pub async fn checkout(&self, wait: Duration) -> Result<PoolEntry> {
        if self.replicas.is_empty() {
            return Err(DistributedError::NoReplicas(self.shard_num));
        }

        let permit = tokio::time::timeout(wait, Arc::clone(&self.slots).acquire_owned())
            .await
            .map_err(|_| DistributedError::PoolTimeout {
                shard: self.shard_num,
                waited_ms: wait.as_millis() as u64,
            })?
            .map_err(|_| {
                DistributedError::NetworkError(format!("pool for shard {} closed", self.shard_num))
            })?;

        let index = self.next_replica.fetch_add(1, Ordering::Relaxed) % self.replicas.len();
        Ok(PoolEntry {
            shard_num: self.shard_num,
            replica: self.replicas[index].clone(),
            timeouts: self.timeouts,
            _permit: permit,
        })
    }
}

/// A checked-out connection slot; capacity returns to the pool on drop
#[derive(Debug)]
pub struct PoolEntry {
    shard_num: usize,
    replica: ReplicaAddress,
    timeouts: ConnectionTimeouts,
    _permit: OwnedSemaphorePermit,
}

impl PoolEntry {
    pub fn shard_num(&self) -> usize {
        self.shard_num
    }

    pub fn replica(&self) -> &ReplicaAddress {
        &self.replica
    }

    pub fn timeouts(&self) -> ConnectionTimeouts {
        self.timeouts
    }
}

#[derive(Debug)]
pub struct Cluster {
    name: String,
    pools: Vec<Arc<ConnectionPool>>,
    local_nodes_num: usize,
}

impl Cluster {
    pub fn new(
        name: impl Into<String>,
        pools: Vec<Arc<ConnectionPool>>,
        local_nodes_num: usize,
    ) -> Self {
        Self {
            name: name.into(),
            pools,
            local_nodes_num,
        }
    }

    /// Build a cluster from its configuration.
    ///
    /// A shard whose replicas include `local` is served by this process and
    /// counts as a local node instead of getting a pool.
    pub fn from_config(
        name: impl Into<String>,
        config: &ClusterConfig,
        settings: &Settings,
        local: Option<&ReplicaAddress>,
    ) -> Result<Self> {
        let name = name.into();
        let timeouts = ConnectionTimeouts::from_settings(settings);
        let mut pools = Vec::new();
        let mut local_nodes_num = 0;

        for (index, shard) in config.shards.iter().enumerate() {
            if shard.replicas.is_empty() {
                return Err(DistributedError::ConfigError(format!(
                    "shard {} of cluster '{}' has no replicas",
                    index + 1,
                    name
                )));
            }
            if local.is_some_and(|addr| shard.contains(addr)) {
                local_nodes_num += 1;
                continue;
            }
            pools.push(Arc::new(ConnectionPool::new(
                index + 1,
                shard.replicas.clone(),
                timeouts,
                settings.max_distributed_connections,
            )));
        }

        tracing::info!(
            "Built cluster '{}' with {} remote shards and {} local nodes",
            name,
            pools.len(),
            local_nodes_num
        );
        Ok(Self::new(name, pools, local_nodes_num))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote shard pools, in shard order
    pub fn pools(&self) -> &[Arc<ConnectionPool>] {
        &self.pools
    }

    pub fn shard_count(&self) -> usize {
        self.pools.len()
    }

    /// Number of shards executed in-process
    pub fn local_nodes_num(&self) -> usize {
        self.local_nodes_num
    }

    /// Every executor a read fans out to
    pub fn participants(&self) -> usize {
        self.shard_count() + self.local_nodes_num
    }

    pub fn saturate(requested: Duration, limit: Option<Duration>) -> Duration {
        saturate(requested, limit)
    }
}

/// How a table holds its cluster
#[derive(Debug)]
pub enum ClusterHandle {
    /// Built for and dropped with one table
    Owned(Box<Cluster>),
    /// Looked up in a [`ClusterRegistry`] and shared by many tables
    Shared(Arc<Cluster>),
}

impl ClusterHandle {
    pub fn owned(cluster: Cluster) -> Self {
        ClusterHandle::Owned(Box::new(cluster))
    }

    pub fn shared(cluster: Arc<Cluster>) -> Self {
        ClusterHandle::Shared(cluster)
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, ClusterHandle::Shared(_))
    }
}

impl Deref for ClusterHandle {
    type Target = Cluster;

    fn deref(&self) -> &Cluster {
        match self {
            ClusterHandle::Owned(cluster) => cluster,
            ClusterHandle::Shared(cluster) => cluster,
        }
    }
}

/// Named clusters available to distributed tables on this node
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    clusters: RwLock<HashMap<String, Arc<Cluster>>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every cluster in `config`
    pub fn from_config(config: &ClustersConfig, settings: &Settings) -> Result<Self> {
        let registry = Self::new();
        for (name, cluster) in &config.clusters {
            let cluster =
                Cluster::from_config(name, cluster, settings, config.local_address.as_ref())?;
            registry.register(cluster);
        }
        Ok(registry)
    }

    /// Add or replace a cluster under its own name
    pub fn register(&self, cluster: Cluster) -> Arc<Cluster> {
        let cluster = Arc::new(cluster);
        self.clusters
            .write()
            .insert(cluster.name().to_string(), Arc::clone(&cluster));
        cluster
    }

    pub fn get(&self, name: &str) -> Result<Arc<Cluster>> {
        self.clusters
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DistributedError::ClusterNotFound(name.to_string()))
    }

    /// Handle for a table that shares the named cluster
    pub fn handle(&self, name: &str) -> Result<ClusterHandle> {
        self.get(name).map(ClusterHandle::Shared)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.read().keys().cloned().collect();
        names.sort();
        names
    }
}
