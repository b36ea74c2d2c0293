use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::StreamError, interface::record::KinesisClientRecord};

pub mod kinesis;
pub mod memory;

pub use kinesis::KinesisStream;
pub use memory::InMemoryStream;

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ShardInfo {
    pub shard_id: String,
    pub parent_shard_id: Option<String>,
}

impl ShardInfo {
    pub fn new(shard_id: impl Into<String>) -> Self {
        Self {
            shard_id: shard_id.into(),
            parent_shard_id: None,
        }
    }
}

/// Where to start reading a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardPosition {
    TrimHorizon,
    Latest,
    AfterSequenceNumber(String),
}

impl ShardPosition {
    pub(crate) fn iterator_type(&self) -> &'static str {
        match self {
            ShardPosition::TrimHorizon => "TRIM_HORIZON",
            ShardPosition::Latest => "LATEST",
            ShardPosition::AfterSequenceNumber(_) => "AFTER_SEQUENCE_NUMBER",
        }
    }
}

pub struct RecordBatch {
    pub records: Vec<KinesisClientRecord>,
    /// `None` once the shard is closed and fully read.
    pub next_shard_iterator: Option<String>,
    pub millis_behind_latest: Option<i64>,
}

#[async_trait]
pub trait StreamReader: Send + Sync {
    async fn list_shards(&self) -> Result<Vec<ShardInfo>, StreamError>;
    async fn shard_iterator(&self, shard_id: &str, position: &ShardPosition) -> Result<String, StreamError>;
    async fn get_records(&self, shard_iterator: &str, limit: usize) -> Result<RecordBatch, StreamError>;
}

#[async_trait]
impl<T: StreamReader + ?Sized> StreamReader for Arc<T> {
    async fn list_shards(&self) -> Result<Vec<ShardInfo>, StreamError> {
        (**self).list_shards().await
    }

    async fn shard_iterator(&self, shard_id: &str, position: &ShardPosition) -> Result<String, StreamError> {
        (**self).shard_iterator(shard_id, position).await
    }

    async fn get_records(&self, shard_iterator: &str, limit: usize) -> Result<RecordBatch, StreamError> {
        (**self).get_records(shard_iterator, limit).await
    }
}
