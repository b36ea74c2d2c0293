use async_trait::async_trait;
use rusoto_core::RusotoError;
use rusoto_kinesis::{
    GetRecordsInput, GetShardIteratorInput, Kinesis, KinesisClient, ListShardsInput, PutRecordError,
    PutRecordInput,
};
use tracing::debug;

use super::{RecordBatch, ShardInfo, ShardPosition, StreamReader};
use crate::{
    config::KclConfiguration,
    error::{ConfigError, StreamError, TransportError},
    interface::record::KinesisClientRecord,
    publisher::{Ack, Record, StreamTransport},
};

/// One Kinesis stream, for both publishing and reading.
#[derive(Clone)]
pub struct KinesisStream {
    stream_name: String,
    kinesis_client: KinesisClient,
}

impl KinesisStream {
    pub fn new(stream_name: impl Into<String>, kinesis_client: KinesisClient) -> Self {
        Self {
            stream_name: stream_name.into(),
            kinesis_client,
        }
    }

    pub fn from_config(config: &KclConfiguration) -> Result<Self, ConfigError> {
        let region = config.region()?;
        Ok(Self::new(config.stream_name.clone(), KinesisClient::new(region)))
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

#[async_trait]
impl StreamTransport for KinesisStream {
    async fn put_record(&self, record: &Record) -> Result<Ack, TransportError> {
        let input = PutRecordInput {
            data: record.payload().clone(),
            explicit_hash_key: record.ordering_key().map(str::to_string),
            partition_key: record.partition_key().to_string(),
            stream_name: self.stream_name.clone(),
            ..Default::default()
        };

        match self.kinesis_client.put_record(input).await {
            Ok(output) => Ok(Ack {
                sequence_number: output.sequence_number,
                shard_id: output.shard_id,
            }),
            Err(RusotoError::Service(PutRecordError::ResourceNotFound(_))) => {
                Err(TransportError::StreamNotFound(self.stream_name.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl StreamReader for KinesisStream {
    async fn list_shards(&self) -> Result<Vec<ShardInfo>, StreamError> {
        let mut result = Vec::new();
        let mut request = ListShardsInput {
            stream_name: Some(self.stream_name.clone()),
            ..Default::default()
        };
        loop {
            let response = self.kinesis_client.list_shards(request).await?;
            result.extend(response.shards.unwrap_or_default().into_iter().map(|shard| ShardInfo {
                shard_id: shard.shard_id,
                parent_shard_id: shard.parent_shard_id,
            }));

            // A paging request must not name the stream.
            match response.next_token {
                Some(next_token) => {
                    request = ListShardsInput {
                        next_token: Some(next_token),
                        ..Default::default()
                    }
                }
                None => break,
            }
        }
        debug!(stream = %self.stream_name, shards = result.len(), "listed shards");
        Ok(result)
    }

    async fn shard_iterator(&self, shard_id: &str, position: &ShardPosition) -> Result<String, StreamError> {
        let starting_sequence_number = match position {
            ShardPosition::AfterSequenceNumber(seq) => Some(seq.clone()),
            _ => None,
        };
        let response = self
            .kinesis_client
            .get_shard_iterator(GetShardIteratorInput {
                shard_id: shard_id.to_string(),
                shard_iterator_type: position.iterator_type().to_string(),
                starting_sequence_number,
                stream_name: self.stream_name.clone(),
                ..Default::default()
            })
            .await?;
        response
            .shard_iterator
            .ok_or_else(|| StreamError::ShardNotFound(shard_id.to_string()))
    }

    async fn get_records(&self, shard_iterator: &str, limit: usize) -> Result<RecordBatch, StreamError> {
        let response = self
            .kinesis_client
            .get_records(GetRecordsInput {
                limit: Some(limit as i64),
                shard_iterator: shard_iterator.to_string(),
                ..Default::default()
            })
            .await?;
        Ok(RecordBatch {
            records: response
                .records
                .into_iter()
                .map(KinesisClientRecord::from_record)
                .collect(),
            next_shard_iterator: response.next_shard_iterator,
            millis_behind_latest: response.millis_behind_latest,
        })
    }
}
