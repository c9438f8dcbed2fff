//! Lazy block streams
//!
//! Every executor, remote or in-process, hands its result back as a
//! [`BlockStream`]: nothing runs until the first call to `next_batch`.

use crate::error::Result;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

/// A lazily evaluated sequence of record batches
#[async_trait]
pub trait BlockStream: Send {
    /// Get the next batch from the stream.
    /// Returns None when the stream is exhausted
    async fn next_batch(&mut self) -> Option<Result<RecordBatch>>;

    /// Get stream name for logging
    fn name(&self) -> &str;
}

/// Drain a stream, stopping at the first error
pub async fn collect_batches(stream: &mut (dyn BlockStream + '_)) -> Result<Vec<RecordBatch>> {
    let mut batches = Vec::new();
    while let Some(batch) = stream.next_batch().await {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Stream over batches already held in memory
pub struct MemoryBlockStream {
    batches: std::vec::IntoIter<RecordBatch>,
    name: String,
}

impl MemoryBlockStream {
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self::with_name(batches, "memory")
    }

    pub fn with_name(batches: Vec<RecordBatch>, name: impl Into<String>) -> Self {
        Self {
            batches: batches.into_iter(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl BlockStream for MemoryBlockStream {
    async fn next_batch(&mut self) -> Option<Result<RecordBatch>> {
        self.batches.next().map(Ok)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn create_test_batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    #[tokio::test]
    async fn test_memory_block_stream() {
        let mut stream = MemoryBlockStream::new(vec![
            create_test_batch(vec![1, 2, 3]),
            create_test_batch(vec![4, 5]),
        ]);

        assert_eq!(stream.next_batch().await.unwrap().unwrap().num_rows(), 3);
        assert_eq!(stream.next_batch().await.unwrap().unwrap().num_rows(), 2);
        assert!(stream.next_batch().await.is_none());
        assert_eq!(stream.name(), "memory");
    }

    #[tokio::test]
    async fn test_collect_batches() {
        let mut stream = MemoryBlockStream::with_name(vec![create_test_batch(vec![1])], "one");
        let batches = collect_batches(&mut stream).await.unwrap();
        assert_eq!(batches.len(), 1);
    }
}
