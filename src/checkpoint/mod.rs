use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{error::CheckpointError, interface::processor::Checkpointer};

/// A Kinesis sequence number: a decimal string of up to 128 bits.
///
/// Compared numerically, so leading zeros are not significant.
#[derive(Debug, Clone)]
pub struct SequenceNumber(String);

impl SequenceNumber {
    pub fn parse(value: &str) -> Result<Self, CheckpointError> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CheckpointError::InvalidSequenceNumber(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Wraps a value without checking that it is numeric.
    pub fn unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn significant(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl Ord for SequenceNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialEq for SequenceNumber {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for SequenceNumber {}

impl Hash for SequenceNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state)
    }
}

impl PartialOrd for SequenceNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkpoint {
    SequenceNumber(SequenceNumber),
    /// Every record of the shard has been processed.
    ShardEnd,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::SequenceNumber(seq) => seq.fmt(f),
            Checkpoint::ShardEnd => f.write_str("SHARD_END"),
        }
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, shard_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;
    async fn set_checkpoint(&self, shard_id: &str, checkpoint: Checkpoint) -> Result<(), CheckpointError>;
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get_checkpoint(&self, shard_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.checkpoints.read().await.get(shard_id).cloned())
    }

    async fn set_checkpoint(&self, shard_id: &str, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints
            .write()
            .await
            .insert(shard_id.to_string(), checkpoint);
        Ok(())
    }
}

/// The [`Checkpointer`] handed to a shard's record processor.
pub struct ShardCheckpointer {
    shard_id: String,
    store: Arc<dyn CheckpointStore>,
    validate: bool,
}

impl ShardCheckpointer {
    pub fn new(shard_id: impl Into<String>, store: Arc<dyn CheckpointStore>, validate: bool) -> Self {
        Self {
            shard_id: shard_id.into(),
            store,
            validate,
        }
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub async fn current(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        self.store.get_checkpoint(&self.shard_id).await
    }
}

#[async_trait]
impl Checkpointer for ShardCheckpointer {
    async fn checkpoint(&self, sequence_number: Option<&str>) -> Result<(), CheckpointError> {
        let current = self.current().await?;
        if current == Some(Checkpoint::ShardEnd) {
            return Err(CheckpointError::ShardEnded(self.shard_id.clone()));
        }

        let checkpoint = match sequence_number {
            None => Checkpoint::ShardEnd,
            Some(value) if !self.validate => Checkpoint::SequenceNumber(SequenceNumber::unchecked(value)),
            Some(value) => {
                let attempted = SequenceNumber::parse(value)?;
                if let Some(Checkpoint::SequenceNumber(current)) = current {
                    if attempted < current {
                        return Err(CheckpointError::Regression {
                            attempted: attempted.to_string(),
                            current: current.to_string(),
                        });
                    }
                }
                Checkpoint::SequenceNumber(attempted)
            }
        };

        debug!(shard_id = %self.shard_id, checkpoint = %checkpoint, "recording checkpoint");
        self.store.set_checkpoint(&self.shard_id, checkpoint).await
    }
}
