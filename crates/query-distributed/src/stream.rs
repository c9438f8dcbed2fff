//! Result streams of a distributed read

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use query_core::{BlockStream, Result};

/// Stream fed by a remote shard
pub struct RemoteBlockInputStream {
    shard_num: usize,
    inner: Box<dyn BlockStream>,
    name: String,
}

impl RemoteBlockInputStream {
    pub fn new(shard_num: usize, inner: Box<dyn BlockStream>) -> Self {
        Self {
            shard_num,
            inner,
            name: format!("remote(shard {})", shard_num),
        }
    }

    pub fn shard_num(&self) -> usize {
        self.shard_num
    }
}

/// Stream fed by the in-process interpreter
pub struct LocalBlockInputStream {
    inner: Box<dyn BlockStream>,
    name: String,
}

impl LocalBlockInputStream {
    pub fn new(index: usize, inner: Box<dyn BlockStream>) -> Self {
        Self {
            inner,
            name: format!("local({})", index),
        }
    }
}

/// One participant's lazily evaluated output
pub enum BlockInputStream {
    Remote(RemoteBlockInputStream),
    Local(LocalBlockInputStream),
}

impl BlockInputStream {
    pub fn remote(shard_num: usize, inner: Box<dyn BlockStream>) -> Self {
        BlockInputStream::Remote(RemoteBlockInputStream::new(shard_num, inner))
    }

    pub fn local(index: usize, inner: Box<dyn BlockStream>) -> Self {
        BlockInputStream::Local(LocalBlockInputStream::new(index, inner))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, BlockInputStream::Remote(_))
    }

    /// Shard this stream reads from, if it is remote
    pub fn shard_num(&self) -> Option<usize> {
        match self {
            BlockInputStream::Remote(remote) => Some(remote.shard_num()),
            BlockInputStream::Local(_) => None,
        }
    }
}

#[async_trait]
impl BlockStream for BlockInputStream {
    async fn next_batch(&mut self) -> Option<Result<RecordBatch>> {
        match self {
            BlockInputStream::Remote(remote) => remote.inner.next_batch().await,
            BlockInputStream::Local(local) => local.inner.next_batch().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            BlockInputStream::Remote(remote) => &remote.name,
            BlockInputStream::Local(local) => &local.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use query_core::{collect_batches, MemoryBlockStream};
    use std::sync::Arc;

    fn create_test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap()
    }

    #[tokio::test]
    async fn test_variants_delegate() {
        let mut remote =
            BlockInputStream::remote(3, Box::new(MemoryBlockStream::new(vec![create_test_batch()])));
        let mut local = BlockInputStream::local(0, Box::new(MemoryBlockStream::new(vec![])));

        assert!(remote.is_remote());
        assert_eq!(remote.shard_num(), Some(3));
        assert_eq!(remote.name(), "remote(shard 3)");
        assert_eq!(local.shard_num(), None);
        assert_eq!(local.name(), "local(0)");

        assert_eq!(collect_batches(&mut remote).await.unwrap().len(), 1);
        assert!(collect_batches(&mut local).await.unwrap().is_empty());
    }
}
