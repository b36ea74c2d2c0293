use bytes::Bytes;
use rusoto_kinesis::Record;

/// A record as delivered to a [`RecordProcessor`](super::processor::RecordProcessor).
#[derive(Debug, Clone, PartialEq)]
pub struct KinesisClientRecord {
    pub sequence_number: String,
    /// Seconds since the epoch, as reported by Kinesis.
    pub approximate_arrival_timestamp: Option<f64>,
    pub data: Bytes,
    pub partition_key: String,
    pub encryption_type: Option<String>,
}

impl KinesisClientRecord {
    pub fn new(sequence_number: impl Into<String>, partition_key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            sequence_number: sequence_number.into(),
            approximate_arrival_timestamp: None,
            data: data.into(),
            partition_key: partition_key.into(),
            encryption_type: None,
        }
    }

    pub(crate) fn from_record(record: Record) -> Self {
        Self {
            sequence_number: record.sequence_number,
            approximate_arrival_timestamp: record.approximate_arrival_timestamp,
            data: record.data,
            partition_key: record.partition_key,
            encryption_type: record.encryption_type,
        }
    }
}
