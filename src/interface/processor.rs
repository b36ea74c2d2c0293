use std::{fmt, sync::Arc};

use async_trait::async_trait;

use super::record::KinesisClientRecord;
use crate::{checkpoint::Checkpoint, error::CheckpointError};

pub struct InitializationInput {
    pub shard_id: String,
    /// Where processing resumes, if the shard was checkpointed before.
    pub checkpoint: Option<Checkpoint>,
}

pub struct ProcessRecordsInput {
    /// Records in arrival order. May be empty.
    pub records: Vec<KinesisClientRecord>,
    pub millis_behind_latest: Option<i64>,
    pub checkpointer: Arc<dyn Checkpointer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The shard was fully consumed or permanently reassigned.
    Terminate,
    /// The lease was lost to another worker.
    Zombie,
    /// The application asked the worker to stop.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ShutdownReason::Terminate => "TERMINATE",
            ShutdownReason::Zombie => "ZOMBIE",
            ShutdownReason::Requested => "REQUESTED",
        };
        f.write_str(reason)
    }
}

pub struct ShutdownInput {
    pub reason: ShutdownReason,
    pub checkpointer: Arc<dyn Checkpointer>,
}

/// Records progress for the shard a processor is bound to.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Marks everything up to and including `sequence_number` as processed.
    /// `None` marks the shard as fully consumed.
    async fn checkpoint(&self, sequence_number: Option<&str>) -> Result<(), CheckpointError>;
}

/// Lifecycle callbacks invoked by the runtime for one shard.
///
/// Calls into one instance are never concurrent.
#[async_trait]
pub trait RecordProcessor: Send {
    async fn initialize(&mut self, input: InitializationInput);
    async fn process_records(&mut self, input: ProcessRecordsInput);
    async fn shutdown(&mut self, input: ShutdownInput);
}
