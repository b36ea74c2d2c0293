use rusoto_core::RusotoError;
use rusoto_kinesis::{GetRecordsError, GetShardIteratorError, ListShardsError, PutRecordError};
use thiserror::Error;

/// Boxed error returned by application code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single send to the stream transport failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("kinesis rejected the record: {0}")]
    Kinesis(#[from] RusotoError<PutRecordError>),
    #[error("stream {0} does not exist")]
    StreamNotFound(String),
    #[error("record rejected: {0}")]
    Rejected(String),
}

/// Publishing a record failed. The record was not retried.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("error in publishing a message into the stream")]
    Transport(#[from] TransportError),
}

/// Reading from the stream failed.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("unable to list shards: {0}")]
    ListShards(#[from] RusotoError<ListShardsError>),
    #[error("unable to get shard iterator: {0}")]
    GetShardIterator(#[from] RusotoError<GetShardIteratorError>),
    #[error("unable to get records: {0}")]
    GetRecords(#[from] RusotoError<GetRecordsError>),
    #[error("shard {0} does not exist")]
    ShardNotFound(String),
    #[error("invalid shard iterator {0}")]
    InvalidIterator(String),
    #[error("stream unavailable: {0}")]
    Unavailable(String),
}

/// The stream worker could not be started.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("shard discovery failed")]
    ShardDiscovery(#[from] StreamError),
    #[error("invalid worker configuration")]
    Config(#[from] ConfigError),
    #[error("worker has already been started")]
    AlreadyStarted,
    #[error("worker has been shut down")]
    ShutDown,
}

/// The consumer controller failed to start its runtime. Fatal to that attempt.
#[derive(Debug, Error)]
#[error("something went wrong when trying to start the stream worker")]
pub struct StartError(#[from] pub WorkerError);

/// The application handler failed to process one message.
#[derive(Debug, Error)]
#[error("message handling failed: {0}")]
pub struct HandlerError(BoxError);

impl HandlerError {
    pub fn new<E: Into<BoxError>>(err: E) -> Self {
        Self(err.into())
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

/// A checkpoint could not be recorded.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("'{0}' is not a valid sequence number")]
    InvalidSequenceNumber(String),
    #[error("sequence number {attempted} is behind the current checkpoint {current}")]
    Regression { attempted: String, current: String },
    #[error("shard {0} has already been checkpointed at its end")]
    ShardEnded(String),
    #[error("checkpoint store failure: {0}")]
    Store(String),
}

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),
    #[error("{name} is out of range: {reason}")]
    OutOfRange { name: &'static str, reason: String },
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn start_error_keeps_the_cause() {
        let err = StartError::from(WorkerError::ShardDiscovery(StreamError::Unavailable(
            "connection refused".to_string(),
        )));

        let cause = err.source().expect("worker error");
        assert_eq!(cause.to_string(), "shard discovery failed");
        let root = cause.source().expect("stream error");
        assert_eq!(root.to_string(), "stream unavailable: connection refused");
    }

    #[test]
    fn handler_error_accepts_strings_and_errors() {
        let from_str = HandlerError::new("bad payload");
        assert_eq!(from_str.to_string(), "message handling failed: bad payload");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let from_err = HandlerError::new(io);
        assert_eq!(from_err.into_inner().to_string(), "disk full");
    }
}
