//! In-memory table contents

use crate::error::{QueryError, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

/// Schema plus record batches of a table held in memory.
///
/// Used for temporary external tables shipped with a query and for tables
/// registered in a context's catalog.
#[derive(Debug, Clone)]
pub struct TableData {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl TableData {
    /// Create table data, checking that every batch matches the schema
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        for batch in &batches {
            if batch.schema().fields() != schema.fields() {
                return Err(QueryError::SchemaError(format!(
                    "batch schema {:?} does not match table schema {:?}",
                    batch.schema(),
                    schema
                )));
            }
        }
        Ok(Self { schema, batches })
    }

    /// Create table data from non-empty batches, taking the schema of the first
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches
            .first()
            .map(|b| b.schema())
            .ok_or_else(|| QueryError::SchemaError("no batches to infer schema".to_string()))?;
        Self::try_new(schema, batches)
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}
