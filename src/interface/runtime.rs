use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WorkerError;

/// Owns shard assignment and drives the record processor lifecycle.
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    /// Returns once the runtime is consuming.
    async fn start(&self) -> Result<(), WorkerError>;

    /// Stops every shard consumer. Safe to call at any time, more than once.
    async fn shutdown(&self);
}

#[async_trait]
impl<T: WorkerRuntime + ?Sized> WorkerRuntime for Arc<T> {
    async fn start(&self) -> Result<(), WorkerError> {
        (**self).start().await
    }

    async fn shutdown(&self) {
        (**self).shutdown().await
    }
}
