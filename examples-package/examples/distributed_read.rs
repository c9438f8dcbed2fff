//! Distributed Read Example
//!
//! Reads a distributed table whose cluster has one shard served by this node
//! and one remote shard that is not running. The local shard answers; the
//! remote one reports its failure only when its stream is consumed.

use anyhow::Result;
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType as ArrowDataType, Field as ArrowField, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::print_batches;
use query_core::{
    collect_batches, BlockStream, Context, DataType, Field, Schema, Settings, TableData,
};
use query_distributed::{ClusterRegistry, ClustersConfig, DistributedTable, TableDefinition};
use query_parser::{
    format_statement, AlterCommand, BinaryOperator, ColumnDef, Expr, SelectItem, SelectQuery,
    Statement,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLUSTERS: &str = r#"{
    "local_address": { "host": "127.0.0.1", "port": 9000 },
    "clusters": {
        "logs": {
            "shards": [
                { "replicas": [{ "host": "127.0.0.1", "port": 9000 }] },
                { "replicas": [{ "host": "127.0.0.1", "port": 1 }] }
            ]
        }
    }
}"#;

fn hits() -> Result<TableData> {
    let schema = Arc::new(ArrowSchema::new(vec![
        ArrowField::new("id", ArrowDataType::Int64, false),
        ArrowField::new("url", ArrowDataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])),
            Arc::new(StringArray::from(vec!["/", "/docs", "/blog", "/about", "/docs"])),
        ],
    )?;
    Ok(TableData::from_batches(vec![batch])?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    println!("=== Distributed Read Example ===\n");

    let settings = Settings {
        connect_timeout_ms: 500,
        ..Settings::default()
    };
    let registry = ClusterRegistry::from_config(&ClustersConfig::from_json(CLUSTERS)?, &settings)?;
    let cluster = registry.get("logs")?;
    println!(
        "Cluster '{}': {} remote shard(s), {} local\n",
        cluster.name(),
        cluster.shard_count(),
        cluster.local_nodes_num()
    );

    // The physical table this node holds for its shard
    let context = Context::new(settings.clone());
    let data = hits()?;
    info!("Registering default.hits_local with {} rows", data.num_rows());
    context.register_table("default", "hits_local", data);

    let table = DistributedTable::new(
        TableDefinition::new(
            "hits",
            Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("url", DataType::Utf8, false),
            ]),
            "default",
            "hits_local",
        ),
        registry.handle("logs")?,
        context,
    )?;

    let query = Statement::Select(
        SelectQuery::from_table(
            vec![SelectItem::column("id"), SelectItem::column("url")],
            None,
            "hits",
        )
        .with_selection(Expr::binary(
            Expr::column("id"),
            BinaryOperator::Greater,
            Expr::number(2),
        )),
    );
    println!("Query: {}\n", format_statement(&query));

    let mut result = table.read(
        &["id".to_string(), "url".to_string()],
        &query,
        &settings,
        settings.max_block_size,
        settings.max_threads,
    )?;
    println!(
        "Stage: {:?}, {} remote and {} local stream(s)\n",
        result.stage,
        result.remote_count(),
        result.local_count()
    );

    for stream in result.streams.iter_mut() {
        let name = stream.name().to_string();
        match collect_batches(stream).await {
            Ok(batches) => {
                info!("{} returned {} batches", name, batches.len());
                println!("{}:", name);
                print_batches(&batches)?;
            }
            Err(e) => warn!("{} failed: {}", name, e),
        }
        println!();
    }

    table.alter(&[AlterCommand::AddColumn {
        column: ColumnDef::new("referer", DataType::Utf8, true),
        after: Some("url".to_string()),
    }])?;
    println!("Schema after ALTER:");
    for field in table.schema().fields() {
        println!("  {} {:?}", field.name(), field.data_type());
    }

    Ok(())
}
