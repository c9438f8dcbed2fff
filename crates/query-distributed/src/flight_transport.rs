//! Flight Transport for Distributed Reads
//!
//! Uses Arrow Flight as the transport between a distributed table and its
//! shards. Nothing is sent until the stream is first polled.

use crate::cluster::{ConnectionPool, ConnectionTimeouts, PoolEntry};
use crate::config::ReplicaAddress;
use crate::error::{DistributedError, Result};
use crate::network::RemoteQueryTicket;
use crate::remote::{RemoteExecutor, RemoteQuery};
use arrow::record_batch::RecordBatch;
use arrow_flight::decode::FlightRecordBatchStream;
use arrow_flight::flight_service_client::FlightServiceClient;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{StreamExt, TryStreamExt};
use query_core::{BlockStream, QueryError};
use std::sync::Arc;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

/// Remote executor speaking Arrow Flight, with channels cached per replica
#[derive(Debug, Clone, Default)]
pub struct FlightRemoteExecutor {
    channels: Arc<DashMap<ReplicaAddress, Channel>>,
}

impl FlightRemoteExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of replicas with an open channel
    pub fn cached_channels(&self) -> usize {
        self.channels.len()
    }
}

impl RemoteExecutor for FlightRemoteExecutor {
    fn open(&self, pool: Arc<ConnectionPool>, query: RemoteQuery) -> Box<dyn BlockStream> {
        let name = format!("flight(shard {})", pool.shard_num());
        Box::new(FlightBlockStream {
            pool,
            query,
            channels: Arc::clone(&self.channels),
            state: FlightState::Pending,
            name,
        })
    }
}

enum FlightState {
    Pending,
    Receiving {
        /// Holds the pool slot for as long as results are streaming
        entry: PoolEntry,
        batches: FlightRecordBatchStream,
    },
    Done,
}

/// Lazy stream over the results of one shard
pub struct FlightBlockStream {
    pool: Arc<ConnectionPool>,
    query: RemoteQuery,
    channels: Arc<DashMap<ReplicaAddress, Channel>>,
    state: FlightState,
    name: String,
}

impl FlightBlockStream {
    /// Takes owned parts so the future stays `Send`: the stream itself holds
    /// a decoder that is not `Sync`.
    async fn connect(
        pool: Arc<ConnectionPool>,
        query: RemoteQuery,
        channels: Arc<DashMap<ReplicaAddress, Channel>>,
    ) -> Result<(PoolEntry, FlightRecordBatchStream)> {
        let entry = pool.checkout(query.settings.queue_max_wait()).await?;
        let timeouts = entry.timeouts();
        let channel = Self::channel(&channels, entry.replica(), timeouts).await?;

        info!(
            "Sending {} to shard {} at {}",
            query.query_id,
            entry.shard_num(),
            entry.replica()
        );
        let ticket = RemoteQueryTicket::from_query(&query)?.to_ticket()?;
        let mut client = FlightServiceClient::new(channel);
        let response = tokio::time::timeout(timeouts.send, client.do_get(ticket))
            .await
            .map_err(|_| {
                DistributedError::NetworkError(format!(
                    "sending query to {} timed out",
                    entry.replica()
                ))
            })?
            .map_err(|status| DistributedError::NetworkError(status.to_string()))?;

        let stream = response
            .into_inner()
            .map_err(arrow_flight::error::FlightError::Tonic);
        Ok((entry, FlightRecordBatchStream::new_from_flight_data(stream)))
    }

    async fn channel(
        channels: &DashMap<ReplicaAddress, Channel>,
        replica: &ReplicaAddress,
        timeouts: ConnectionTimeouts,
    ) -> Result<Channel> {
        let cached = channels.get(replica).map(|channel| channel.clone());
        if let Some(channel) = cached {
            return Ok(channel);
        }

        debug!("Opening channel to {}", replica);
        let channel = Endpoint::from_shared(replica.endpoint())
            .map_err(|e| DistributedError::ConfigError(e.to_string()))?
            .connect_timeout(timeouts.connect)
            .connect()
            .await
            .map_err(|e| {
                DistributedError::NetworkError(format!("connect to {} failed: {}", replica, e))
            })?;
        channels.insert(replica.clone(), channel.clone());
        Ok(channel)
    }
}

#[async_trait]
impl BlockStream for FlightBlockStream {
    async fn next_batch(&mut self) -> Option<query_core::Result<RecordBatch>> {
        let (entry, mut batches) = match std::mem::replace(&mut self.state, FlightState::Done) {
            FlightState::Pending => match Self::connect(
                Arc::clone(&self.pool),
                self.query.clone(),
                Arc::clone(&self.channels),
            )
            .await
            {
                Ok(connected) => connected,
                Err(e) => return Some(Err(e.into())),
            },
            FlightState::Receiving { entry, batches } => (entry, batches),
            FlightState::Done => return None,
        };

        let receive = entry.timeouts().receive;
        let item = match tokio::time::timeout(receive, batches.next()).await {
            Ok(Some(Ok(batch))) => Some(Ok(batch)),
            Ok(Some(Err(e))) => Some(Err(QueryError::RemoteError(format!(
                "shard {}: {}",
                entry.shard_num(),
                e
            )))),
            Ok(None) => None,
            Err(_) => Some(Err(QueryError::RemoteError(format!(
                "shard {}: no data received for {}ms",
                entry.shard_num(),
                receive.as_millis()
            )))),
        };

        if matches!(item, Some(Ok(_))) {
            self.state = FlightState::Receiving { entry, batches };
        }
        item
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ExternalTables;
    use crate::types::QueryId;
    use query_core::{ProcessingStage, Settings};
    use std::time::Duration;

    fn create_test_query() -> RemoteQuery {
        RemoteQuery {
            query_id: QueryId::new(),
            query: "SELECT 1".to_string(),
            settings: Settings::default().with_queue_max_wait(Duration::from_millis(50)),
            external_tables: ExternalTables::new(),
            stage: ProcessingStage::Complete,
        }
    }

    fn create_test_pool(replicas: Vec<ReplicaAddress>) -> Arc<ConnectionPool> {
        let settings = Settings {
            connect_timeout_ms: 200,
            ..Settings::default()
        };
        Arc::new(ConnectionPool::new(
            1,
            replicas,
            ConnectionTimeouts::from_settings(&settings),
            2,
        ))
    }

    #[test]
    fn test_open_is_lazy() {
        let executor = FlightRemoteExecutor::new();
        let pool = create_test_pool(vec![ReplicaAddress::new("127.0.0.1", 1)]);

        let stream = executor.open(Arc::clone(&pool), create_test_query());
        assert_eq!(stream.name(), "flight(shard 1)");
        assert_eq!(pool.available_connections(), 2);
        assert_eq!(executor.cached_channels(), 0);
    }

    #[tokio::test]
    async fn test_empty_pool_fails_on_consume() {
        let executor = FlightRemoteExecutor::new();
        let mut stream = executor.open(create_test_pool(vec![]), create_test_query());

        let first = stream.next_batch().await;
        match first {
            Some(Err(QueryError::RemoteError(msg))) => assert!(msg.contains("No replicas")),
            _ => panic!("expected a remote error"),
        }
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_consumed_on_another_task() {
        let executor = FlightRemoteExecutor::new();
        let pool = create_test_pool(vec![ReplicaAddress::new("127.0.0.1", 1)]);
        let stream = FlightBlockStream {
            pool: Arc::clone(&pool),
            query: create_test_query(),
            channels: Arc::clone(&executor.channels),
            state: FlightState::Pending,
            name: "flight(shard 1)".to_string(),
        };

        let handle = tokio::spawn(async move {
            let mut stream = stream;
            let first = stream.next_batch().await;
            (matches!(first, Some(Err(_))), stream.next_batch().await.is_none())
        });
        assert_eq!(handle.await.unwrap(), (true, true));
        assert_eq!(pool.available_connections(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_replica_fails_on_consume() {
        let executor = FlightRemoteExecutor::new();
        let pool = create_test_pool(vec![ReplicaAddress::new("127.0.0.1", 1)]);
        let mut stream = executor.open(Arc::clone(&pool), create_test_query());

        assert!(matches!(stream.next_batch().await, Some(Err(_))));
        // The slot is released once the attempt fails
        assert_eq!(pool.available_connections(), 2);
        assert_eq!(executor.cached_channels(), 0);
    }
}
