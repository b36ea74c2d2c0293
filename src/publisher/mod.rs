use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, info, info_span, Instrument, Span};

use crate::error::{PublishError, TransportError};

pub mod record;

pub use record::Record;

/// Where a published record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub sequence_number: String,
    pub shard_id: String,
}

/// Appends single records to a stream. Must be safe for concurrent use.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn put_record(&self, record: &Record) -> Result<Ack, TransportError>;
}

#[async_trait]
impl<T: StreamTransport + ?Sized> StreamTransport for Arc<T> {
    async fn put_record(&self, record: &Record) -> Result<Ack, TransportError> {
        (**self).put_record(record).await
    }
}

/// Publishes payloads one record at a time. Never retries.
pub struct Publisher<T> {
    transport: T,
    span: Span,
}

impl<T: StreamTransport> Publisher<T> {
    pub fn new(transport: T) -> Self {
        info!("creating new stream publisher");
        Self {
            transport,
            span: info_span!("publisher"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Sends `payload` to the stream. A non-empty `ordering_key` pins the
    /// record to a single shard.
    pub async fn publish(&self, payload: impl Into<Bytes>, ordering_key: &str) -> Result<Ack, PublishError> {
        let record = Record::build(payload, ordering_key);
        self.send(record).instrument(self.span.clone()).await
    }

    async fn send(&self, record: Record) -> Result<Ack, PublishError> {
        debug!(
            partition_key = record.partition_key(),
            ordering_key = record.ordering_key().unwrap_or_default(),
            bytes = record.payload().len(),
            "publishing new message"
        );

        match self.transport.put_record(&record).await {
            Ok(ack) => {
                debug!(
                    sequence_number = %ack.sequence_number,
                    shard_id = %ack.shard_id,
                    "message was published"
                );
                Ok(ack)
            }
            Err(err) => {
                error!(error = %err, partition_key = record.partition_key(), "error in publishing a message");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every put and answers with a canned result.
    #[derive(Default)]
    struct RecordingTransport {
        received: Mutex<Vec<Record>>,
        fail_with: Option<String>,
    }

    impl RecordingTransport {
        fn failing(reason: &str) -> Self {
            Self {
                fail_with: Some(reason.to_string()),
                ..Default::default()
            }
        }

        fn received(&self) -> Vec<Record> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StreamTransport for RecordingTransport {
        async fn put_record(&self, record: &Record) -> Result<Ack, TransportError> {
            self.received.lock().unwrap().push(record.clone());
            match &self.fail_with {
                Some(reason) => Err(TransportError::Rejected(reason.clone())),
                None => Ok(Ack {
                    sequence_number: "321".to_string(),
                    shard_id: "123".to_string(),
                }),
            }
        }
    }

    const RAW_MESSAGE: &str = r#"{"name":"fernando"}"#;

    #[tokio::test]
    async fn publish_with_ordering_key() {
        let transport = Arc::new(RecordingTransport::default());
        let publisher = Publisher::new(transport.clone());

        let ack = publisher
            .publish(RAW_MESSAGE, "ddfasdf2343sfsd434sfs")
            .await
            .expect("published");

        assert_eq!(
            ack,
            Ack {
                sequence_number: "321".to_string(),
                shard_id: "123".to_string()
            }
        );
        let received = transport.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload().as_ref(), RAW_MESSAGE.as_bytes());
        assert!(!received[0].partition_key().is_empty());
        assert_eq!(received[0].ordering_key(), Some("ddfasdf2343sfsd434sfs"));
        assert_ne!(received[0].partition_key(), "ddfasdf2343sfsd434sfs");
    }

    #[tokio::test]
    async fn publish_without_ordering_key() {
        let transport = Arc::new(RecordingTransport::default());
        let publisher = Publisher::new(transport.clone());

        publisher.publish(RAW_MESSAGE, "").await.expect("published");

        let received = transport.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload().as_ref(), RAW_MESSAGE.as_bytes());
        assert!(!received[0].partition_key().is_empty());
        assert_eq!(received[0].ordering_key(), None);
    }

    #[tokio::test]
    async fn transport_failure_is_returned_without_retry() {
        let transport = Arc::new(RecordingTransport::failing("unexpected error"));
        let publisher = Publisher::new(transport.clone());

        let err = publisher.publish(RAW_MESSAGE, "").await.expect_err("transport failed");

        assert!(matches!(
            err,
            PublishError::Transport(TransportError::Rejected(ref reason)) if reason == "unexpected error"
        ));
        assert_eq!(transport.received().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_publishes_share_the_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let publisher = Arc::new(Publisher::new(transport.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let publisher = publisher.clone();
                tokio::spawn(async move { publisher.publish(format!("message-{}", i), "").await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.expect("task").expect("published");
        }

        assert_eq!(transport.received().len(), 8);
    }
}
