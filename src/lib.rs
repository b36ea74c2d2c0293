//! Publish/consume over a partitioned stream such as Kinesis.
//!
//! Delivery is at-least-once: records handled after the last checkpoint are
//! delivered again after a restart, and handlers deduplicate on their own keys.

pub mod checkpoint;
pub mod config;
pub mod consumer;
pub mod error;
pub mod interface;
pub mod publisher;
pub mod stream;
pub mod worker;

mod util;

pub use config::{InitialPosition, KclConfiguration};
pub use consumer::{ConsumerController, HandlerProcessorFactory, HandlerRecordProcessor, RecordProcessorFactory};
pub use publisher::{Ack, Publisher, Record, StreamTransport};
pub use worker::Worker;
