//! Cluster topology configuration
//!
//! Topologies are loaded from JSON:
//!
//! ```json
//! {
//!   "local_address": { "host": "10.0.0.1", "port": 9000 },
//!   "clusters": {
//!     "logs": {
//!       "shards": [
//!         { "replicas": [{ "host": "10.0.0.1", "port": 9000 }] },
//!         { "replicas": [{ "host": "10.0.0.2", "port": 9000 },
//!                        { "host": "10.0.0.3", "port": 9000 }] }
//!       ]
//!     }
//!   }
//! }
//! ```

use crate::error::{DistributedError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Network address of one replica
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaAddress {
    pub host: String,
    pub port: u16,
}

impl ReplicaAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URI for a gRPC channel to this replica
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ReplicaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ReplicaAddress {
    type Err = DistributedError;

    /// Parse `host:port`
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| DistributedError::ConfigError(format!("missing port in '{}'", s)))?;
        if host.is_empty() {
            return Err(DistributedError::ConfigError(format!(
                "missing host in '{}'",
                s
            )));
        }
        let port = port
            .parse()
            .map_err(|_| DistributedError::ConfigError(format!("invalid port in '{}'", s)))?;
        Ok(Self::new(host, port))
    }
}

/// One shard: the replicas holding the same data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub replicas: Vec<ReplicaAddress>,
}

impl ShardConfig {
    pub fn new(replicas: Vec<ReplicaAddress>) -> Self {
        Self { replicas }
    }

    /// Whether `address` is one of this shard's replicas
    pub fn contains(&self, address: &ReplicaAddress) -> bool {
        self.replicas.iter().any(|r| r == address)
    }
}

/// Shards of one cluster, in shard order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub shards: Vec<ShardConfig>,
}

/// Every cluster known to this node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClustersConfig {
    /// Address this node serves on; shards listing it are read in-process
    pub local_address: Option<ReplicaAddress>,
    pub clusters: BTreeMap<String, ClusterConfig>,
}

impl ClustersConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: ClustersConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Every shard must list at least one replica
    pub fn validate(&self) -> Result<()> {
        for (name, cluster) in &self.clusters {
            for (index, shard) in cluster.shards.iter().enumerate() {
                if shard.replicas.is_empty() {
                    return Err(DistributedError::ConfigError(format!(
                        "shard {} of cluster '{}' has no replicas",
                        index + 1,
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replica_address() {
        let addr: ReplicaAddress = "10.0.0.1:9000".parse().unwrap();
        assert_eq!(addr, ReplicaAddress::new("10.0.0.1", 9000));
        assert_eq!(addr.endpoint(), "http://10.0.0.1:9000");
        assert_eq!(addr.to_string(), "10.0.0.1:9000");

        assert!("no-port".parse::<ReplicaAddress>().is_err());
        assert!(":9000".parse::<ReplicaAddress>().is_err());
        assert!("host:http".parse::<ReplicaAddress>().is_err());
    }

    #[test]
    fn test_clusters_from_json() {
        let config = ClustersConfig::from_json(
            r#"{
                "local_address": { "host": "a", "port": 1 },
                "clusters": {
                    "logs": { "shards": [
                        { "replicas": [{ "host": "a", "port": 1 }] },
                        { "replicas": [{ "host": "b", "port": 1 }, { "host": "c", "port": 1 }] }
                    ] }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.local_address, Some(ReplicaAddress::new("a", 1)));
        let logs = &config.clusters["logs"];
        assert_eq!(logs.shards.len(), 2);
        assert!(logs.shards[1].contains(&ReplicaAddress::new("c", 1)));
    }

    #[test]
    fn test_save_and_load_file() {
        let mut config = ClustersConfig {
            local_address: Some(ReplicaAddress::new("a", 1)),
            ..Default::default()
        };
        config.clusters.insert(
            "logs".to_string(),
            ClusterConfig {
                shards: vec![
                    ShardConfig::new(vec![ReplicaAddress::new("a", 1)]),
                    ShardConfig::new(vec![ReplicaAddress::new("b", 2)]),
                ],
            },
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.json");
        config.save(&path).unwrap();
        assert_eq!(ClustersConfig::from_file(&path).unwrap(), config);

        let missing = ClustersConfig::from_file(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(DistributedError::IoError(_))));
    }

    #[test]
    fn test_file_with_empty_shard_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.json");
        std::fs::write(&path, r#"{ "clusters": { "x": { "shards": [ { "replicas": [] } ] } } }"#)
            .unwrap();
        assert!(matches!(
            ClustersConfig::from_file(&path),
            Err(DistributedError::ConfigError(_))
        ));
    }

    #[test]
    fn test_empty_shard_rejected() {
        let result = ClustersConfig::from_json(r#"{ "clusters": { "x": { "shards": [ { "replicas": [] } ] } } }"#);
        assert!(matches!(result, Err(DistributedError::ConfigError(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = ClustersConfig::from_json("{ not json");
        assert!(matches!(result, Err(DistributedError::JsonError(_))));
    }
}
