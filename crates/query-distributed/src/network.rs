//! Wire format of a remote query
//!
//! A query travels to a shard as the ticket of a Flight `DoGet` call: JSON
//! metadata with every external table embedded as an Arrow IPC stream.

use crate::error::{DistributedError, Result};
use crate::external::ExternalTables;
use crate::remote::RemoteQuery;
use crate::types::QueryId;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use arrow_flight::Ticket;
use query_core::{ProcessingStage, Settings, TableData};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// One external table in IPC form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedTable {
    pub name: String,
    /// IPC stream: schema message followed by every batch. Carried as a
    /// base64 string; plain JSON would spell out every byte as a number.
    #[serde(with = "ipc_base64")]
    pub data: Vec<u8>,
    pub num_rows: usize,
}

impl SerializedTable {
    pub fn from_table(name: &str, table: &TableData) -> Result<Self> {
        let mut buffer = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buffer, &table.schema())
                .map_err(|e| DistributedError::SerializationError(e.to_string()))?;
            for batch in table.batches() {
                writer
                    .write(batch)
                    .map_err(|e| DistributedError::SerializationError(e.to_string()))?;
            }
            writer
                .finish()
                .map_err(|e| DistributedError::SerializationError(e.to_string()))?;
        }

        Ok(Self {
            name: name.to_string(),
            data: buffer,
            num_rows: table.num_rows(),
        })
    }

    pub fn to_table(&self) -> Result<TableData> {
        let reader = StreamReader::try_new(Cursor::new(&self.data), None)
            .map_err(|e| DistributedError::SerializationError(e.to_string()))?;
        let schema = reader.schema();
        let batches = reader
            .collect::<std::result::Result<Vec<RecordBatch>, _>>()
            .map_err(|e| DistributedError::SerializationError(e.to_string()))?;
        Ok(TableData::try_new(schema, batches)?)
    }
}

mod ipc_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Query request sent to a shard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteQueryTicket {
    pub query_id: QueryId,
    pub query: String,
    pub settings: Settings,
    pub stage: ProcessingStage,
    pub external_tables: Vec<SerializedTable>,
}

impl RemoteQueryTicket {
    pub fn from_query(query: &RemoteQuery) -> Result<Self> {
        let external_tables = query
            .external_tables
            .iter()
            .map(|(name, table)| SerializedTable::from_table(name, table))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            query_id: query.query_id,
            query: query.query.clone(),
            settings: query.settings.clone(),
            stage: query.stage,
            external_tables,
        })
    }

    /// Decode the embedded external tables
    pub fn external_tables(&self) -> Result<ExternalTables> {
        let mut tables = ExternalTables::new();
        for table in &self.external_tables {
            tables.insert(table.name.clone(), Arc::new(table.to_table()?));
        }
        Ok(tables)
    }

    pub fn to_ticket(&self) -> Result<Ticket> {
        Ok(Ticket::new(serde_json::to_vec(self)?))
    }

    pub fn from_ticket(ticket: &Ticket) -> Result<Self> {
        Ok(serde_json::from_slice(&ticket.ticket)?)
    }
}
