//! Distributed table
//!
//! A [`DistributedTable`] owns no data. Reading it fans the query out to every
//! shard of its cluster, each resolving the query against its own physical
//! `remote_database.remote_table`, and hands back one lazy stream per shard
//! for the caller to merge.

use crate::alter::apply_alter_commands;
use crate::cluster::{saturate, Cluster, ClusterHandle};
use crate::error::{DistributedError, Result};
use crate::external::ExternalTables;
use crate::flight_transport::FlightRemoteExecutor;
use crate::remote::{RemoteExecutor, RemoteQuery};
use crate::rewriter::rewrite_query;
use crate::stream::BlockInputStream;
use crate::types::{QueryId, ReadResult};
use parking_lot::{Mutex, RwLock};
use query_core::{Context, ProcessingStage, Schema, Settings, TableData};
use query_executor::{QueryInterpreter, SelectInterpreter};
use query_parser::{AlterCommand, Statement};
use std::sync::Arc;
use tracing::{debug, info};

/// Static description of a distributed table
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub name: String,
    pub schema: Schema,
    pub remote_database: String,
    pub remote_table: String,
    /// Sign column for collapsing merges; carried but not interpreted here
    pub sign_column: Option<String>,
}

impl TableDefinition {
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        remote_database: impl Into<String>,
        remote_table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            remote_database: remote_database.into(),
            remote_table: remote_table.into(),
            sign_column: None,
        }
    }

    pub fn with_sign_column(mut self, column: impl Into<String>) -> Self {
        self.sign_column = Some(column.into());
        self
    }
}

pub struct DistributedTable {
    name: String,
    schema: RwLock<Schema>,
    remote_database: String,
    remote_table: String,
    sign_column: Option<String>,
    cluster: ClusterHandle,
    context: Context,
    /// Consumed by the next read
    external_tables: Mutex<ExternalTables>,
    remote_executor: Arc<dyn RemoteExecutor>,
    interpreter: Arc<dyn QueryInterpreter>,
}

impl DistributedTable {
    /// Create a table that reads remote shards over Flight and local shards
    /// with the in-process interpreter
    pub fn new(definition: TableDefinition, cluster: ClusterHandle, context: Context) -> Result<Self> {
        if definition.remote_database.is_empty() {
            return Err(DistributedError::InvalidTable(format!(
                "{}: remote database is empty",
                definition.name
            )));
        }
        if definition.remote_table.is_empty() {
            return Err(DistributedError::InvalidTable(format!(
                "{}: remote table is empty",
                definition.name
            )));
        }

        Ok(Self {
            name: definition.name,
            schema: RwLock::new(definition.schema),
            remote_database: definition.remote_database,
            remote_table: definition.remote_table,
            sign_column: definition.sign_column,
            cluster,
            context,
            external_tables: Mutex::new(ExternalTables::new()),
            remote_executor: Arc::new(FlightRemoteExecutor::new()),
            interpreter: Arc::new(SelectInterpreter::new()),
        })
    }

    pub fn with_remote_executor(mut self, executor: Arc<dyn RemoteExecutor>) -> Self {
        self.remote_executor = executor;
        self
    }

    pub fn with_interpreter(mut self, interpreter: Arc<dyn QueryInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current columns
    pub fn schema(&self) -> Schema {
        self.schema.read().clone()
    }

    pub fn remote_database(&self) -> &str {
        &self.remote_database
    }

    pub fn remote_table(&self) -> &str {
        &self.remote_table
    }

    pub fn sign_column(&self) -> Option<&str> {
        self.sign_column.as_deref()
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Make a temporary table visible to every participant of the next read
    pub fn add_external_table(&self, name: impl Into<String>, data: Arc<TableData>) {
        self.external_tables.lock().insert(name, data);
    }

    pub fn external_table_count(&self) -> usize {
        self.external_tables.lock().len()
    }

    /// Fan `query` out to every participant of the cluster.
    ///
    /// Builds one lazy stream per remote shard, in shard order, followed by
    /// one per local node. Nothing is executed here; connection and query
    /// errors surface when the streams are consumed. External tables added
    /// before the call are shipped with it and the registry is left empty,
    /// whatever the outcome.
    pub fn read(
        &self,
        column_names: &[String],
        query: &Statement,
        settings: &Settings,
        max_block_size: usize,
        threads: usize,
    ) -> Result<ReadResult> {
        let external_tables = std::mem::take(&mut *self.external_tables.lock());

        let mut effective = settings.clone();
        effective.skip_query_rewrite = true;
        effective.queue_max_wait_ms = saturate(
            settings.queue_max_wait(),
            settings.limits.max_execution_time(),
        )
        .as_millis() as u64;

        let cluster: &Cluster = &self.cluster;
        let stage = ProcessingStage::for_participants(cluster.participants());
        let query_id = QueryId::new();

        let rewritten = Arc::new(rewrite_query(
            query,
            &self.remote_database,
            &self.remote_table,
        )?);
        debug!(
            query_id = %query_id,
            table = %self.name,
            query = %rewritten,
            columns = ?column_names,
            max_block_size,
            threads,
            shards = cluster.shard_count(),
            local_nodes = cluster.local_nodes_num(),
            external_tables = external_tables.len(),
            stage = %stage,
            "Distributed read"
        );

        let mut streams = Vec::with_capacity(cluster.participants());

        let query_text = rewritten.to_string();
        for pool in cluster.pools() {
            let remote_query = RemoteQuery {
                query_id,
                query: query_text.clone(),
                settings: effective.clone(),
                external_tables: external_tables.clone(),
                stage,
            };
            let stream = self.remote_executor.open(Arc::clone(pool), remote_query);
            streams.push(BlockInputStream::remote(pool.shard_num(), stream));
        }

        if cluster.local_nodes_num() > 0 {
            let mut local_context = self.context.with_settings(effective);
            for (name, data) in &external_tables {
                if local_context.try_get_external_table(name).is_none() {
                    local_context.add_external_table(name.clone(), Arc::clone(data))?;
                }
            }

            for index in 0..cluster.local_nodes_num() {
                let stream = self.interpreter.interpret(
                    Arc::clone(&rewritten),
                    local_context.clone(),
                    stage,
                );
                streams.push(BlockInputStream::local(index, stream));
            }
        }

        Ok(ReadResult { streams, stage })
    }

    /// Change column definitions; all commands apply or none do
    pub fn alter(&self, commands: &[AlterCommand]) -> Result<()> {
        let _ddl = self.context.lock_ddl();
        let altered = apply_alter_commands(&self.schema.read(), commands)?;
        *self.schema.write() = altered;
        info!(
            "Altered table {} with {} commands, now {} columns",
            self.name,
            commands.len(),
            self.schema.read().len()
        );
        Ok(())
    }

    /// Apply an `ALTER TABLE` statement
    pub fn alter_query(&self, query: &Statement) -> Result<()> {
        match query {
            Statement::Alter(alter) => self.alter(&alter.commands),
            other => Err(DistributedError::UnsupportedQuery {
                expected: "ALTER".to_string(),
                found: other.kind().to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for DistributedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedTable")
            .field("name", &self.name)
            .field("remote_database", &self.remote_database)
            .field("remote_table", &self.remote_table)
            .field("cluster", &self.cluster.name())
            .finish()
    }
}
