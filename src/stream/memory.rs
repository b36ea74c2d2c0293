use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RecordBatch, ShardInfo, ShardPosition, StreamReader};
use crate::{
    checkpoint::SequenceNumber,
    error::{StreamError, TransportError},
    interface::record::KinesisClientRecord,
    publisher::{Ack, Record, StreamTransport},
};

struct MemoryShard {
    shard_id: String,
    records: Vec<KinesisClientRecord>,
    closed: bool,
}

/// A process-local stream with a fixed set of shards.
///
/// Records are placed by hashing the ordering key when present, otherwise the
/// partition key. Shard iterators have the form `<shard index>:<offset>`.
pub struct InMemoryStream {
    shards: RwLock<Vec<MemoryShard>>,
    next_sequence: AtomicU64,
}

impl InMemoryStream {
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|i| MemoryShard {
                shard_id: format!("shardId-{:012}", i),
                records: Vec::new(),
                closed: false,
            })
            .collect();
        Self {
            shards: RwLock::new(shards),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Appends a record to a specific shard, bypassing placement.
    pub async fn append(&self, shard_id: &str, partition_key: &str, data: impl Into<bytes::Bytes>) -> Result<Ack, TransportError> {
        let mut shards = self.shards.write().await;
        let shard = shards
            .iter_mut()
            .find(|shard| shard.shard_id == shard_id)
            .ok_or_else(|| TransportError::Rejected(format!("unknown shard {}", shard_id)))?;
        self.push(shard, partition_key, data.into())
    }

    /// Stops accepting records on a shard. Readers see the shard end once
    /// they have consumed what is already there.
    pub async fn close_shard(&self, shard_id: &str) -> bool {
        let mut shards = self.shards.write().await;
        match shards.iter_mut().find(|shard| shard.shard_id == shard_id) {
            Some(shard) => {
                shard.closed = true;
                true
            }
            None => false,
        }
    }

    pub async fn records(&self, shard_id: &str) -> Vec<KinesisClientRecord> {
        self.shards
            .read()
            .await
            .iter()
            .find(|shard| shard.shard_id == shard_id)
            .map(|shard| shard.records.clone())
            .unwrap_or_default()
    }

    fn push(&self, shard: &mut MemoryShard, partition_key: &str, data: bytes::Bytes) -> Result<Ack, TransportError> {
        if shard.closed {
            return Err(TransportError::Rejected(format!("shard {} is closed", shard.shard_id)));
        }
        let sequence_number = self.next_sequence.fetch_add(1, Ordering::SeqCst).to_string();
        shard
            .records
            .push(KinesisClientRecord::new(sequence_number.clone(), partition_key, data));
        Ok(Ack {
            sequence_number,
            shard_id: shard.shard_id.clone(),
        })
    }

    fn parse_iterator(iterator: &str) -> Result<(usize, usize), StreamError> {
        let invalid = || StreamError::InvalidIterator(iterator.to_string());
        let (shard, offset) = iterator.split_once(':').ok_or_else(invalid)?;
        Ok((
            shard.parse().map_err(|_| invalid())?,
            offset.parse().map_err(|_| invalid())?,
        ))
    }
}

#[async_trait]
impl StreamTransport for InMemoryStream {
    async fn put_record(&self, record: &Record) -> Result<Ack, TransportError> {
        let mut hasher = DefaultHasher::new();
        record.ordering_key().unwrap_or(record.partition_key()).hash(&mut hasher);

        let mut shards = self.shards.write().await;
        let open: Vec<usize> = (0..shards.len()).filter(|&i| !shards[i].closed).collect();
        if open.is_empty() {
            return Err(TransportError::Rejected("no open shards".to_string()));
        }
        let index = open[(hasher.finish() % open.len() as u64) as usize];
        self.push(&mut shards[index], record.partition_key(), record.payload().clone())
    }
}

#[async_trait]
impl StreamReader for InMemoryStream {
    async fn list_shards(&self) -> Result<Vec<ShardInfo>, StreamError> {
        Ok(self
            .shards
            .read()
            .await
            .iter()
            .map(|shard| ShardInfo::new(shard.shard_id.clone()))
            .collect())
    }

    async fn shard_iterator(&self, shard_id: &str, position: &ShardPosition) -> Result<String, StreamError> {
        let shards = self.shards.read().await;
        let (index, shard) = shards
            .iter()
            .enumerate()
            .find(|(_, shard)| shard.shard_id == shard_id)
            .ok_or_else(|| StreamError::ShardNotFound(shard_id.to_string()))?;
        let offset = match position {
            ShardPosition::TrimHorizon => 0,
            ShardPosition::Latest => shard.records.len(),
            ShardPosition::AfterSequenceNumber(seq) => {
                let after = SequenceNumber::unchecked(seq.clone());
                shard
                    .records
                    .iter()
                    .position(|record| SequenceNumber::unchecked(record.sequence_number.clone()) > after)
                    .unwrap_or(shard.records.len())
            }
        };
        Ok(format!("{}:{}", index, offset))
    }

    async fn get_records(&self, shard_iterator: &str, limit: usize) -> Result<RecordBatch, StreamError> {
        let (index, offset) = Self::parse_iterator(shard_iterator)?;
        let shards = self.shards.read().await;
        let shard = shards
            .get(index)
            .ok_or_else(|| StreamError::InvalidIterator(shard_iterator.to_string()))?;

        let start = offset.min(shard.records.len());
        let end = start.saturating_add(limit).min(shard.records.len());
        let records = shard.records[start..end].to_vec();
        let next_shard_iterator = if shard.closed && end == shard.records.len() {
            None
        } else {
            Some(format!("{}:{}", index, end))
        };

        Ok(RecordBatch {
            records,
            next_shard_iterator,
            millis_behind_latest: Some(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_ordering_key_lands_on_one_shard() {
        let stream = InMemoryStream::new(4);

        let mut shards = Vec::new();
        for i in 0..10 {
            let record = Record::build(format!("payload-{}", i), "customer-42");
            shards.push(stream.put_record(&record).await.expect("put").shard_id);
        }

        shards.dedup();
        assert_eq!(shards.len(), 1);
    }

    #[tokio::test]
    async fn reads_in_pages_and_ends_closed_shards() {
        let stream = InMemoryStream::new(1);
        for i in 0..3 {
            stream
                .append("shardId-000000000000", "pk", format!("{}", i))
                .await
                .expect("append");
        }
        stream.close_shard("shardId-000000000000").await;

        let iterator = stream
            .shard_iterator("shardId-000000000000", &ShardPosition::TrimHorizon)
            .await
            .expect("iterator");
        let first = stream.get_records(&iterator, 2).await.expect("records");
        assert_eq!(first.records.len(), 2);
        let next = first.next_shard_iterator.expect("more to read");

        let second = stream.get_records(&next, 2).await.expect("records");
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].data.as_ref(), b"2");
        assert!(second.next_shard_iterator.is_none());
    }

    #[tokio::test]
    async fn resumes_after_sequence_number() {
        let stream = InMemoryStream::new(1);
        let mut acks = Vec::new();
        for i in 0..3 {
            acks.push(
                stream
                    .append("shardId-000000000000", "pk", format!("{}", i))
                    .await
                    .expect("append"),
            );
        }

        let iterator = stream
            .shard_iterator(
                "shardId-000000000000",
                &ShardPosition::AfterSequenceNumber(acks[0].sequence_number.clone()),
            )
            .await
            .expect("iterator");
        let batch = stream.get_records(&iterator, 10).await.expect("records");

        let sequence_numbers: Vec<_> = batch.records.iter().map(|r| r.sequence_number.clone()).collect();
        assert_eq!(sequence_numbers, vec![acks[1].sequence_number.clone(), acks[2].sequence_number.clone()]);
        assert!(batch.next_shard_iterator.is_some());
    }

    #[tokio::test]
    async fn latest_skips_existing_records() {
        let stream = InMemoryStream::new(1);
        stream.append("shardId-000000000000", "pk", "old").await.expect("append");

        let iterator = stream
            .shard_iterator("shardId-000000000000", &ShardPosition::Latest)
            .await
            .expect("iterator");
        stream.append("shardId-000000000000", "pk", "new").await.expect("append");

        let batch = stream.get_records(&iterator, 10).await.expect("records");
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].data.as_ref(), b"new");
    }

    #[tokio::test]
    async fn rejects_writes_to_closed_shards() {
        let stream = InMemoryStream::new(1);
        stream.close_shard("shardId-000000000000").await;

        let err = stream
            .put_record(&Record::build("late", ""))
            .await
            .expect_err("closed");
        assert!(matches!(err, TransportError::Rejected(_)));
    }
}
