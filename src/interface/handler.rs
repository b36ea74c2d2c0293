use async_trait::async_trait;
use bytes::Bytes;

use crate::error::HandlerError;

/// Application logic for one decoded message.
///
/// Invoked synchronously inside batch processing, so it must not block
/// indefinitely. Delivery is at-least-once: a batch interrupted before its
/// checkpoint is delivered again after a restart.
#[async_trait]
pub trait Handler: Send {
    async fn handle(&mut self, data: Bytes) -> Result<(), HandlerError>;
}

/// Produces a fresh [`Handler`] for every shard assignment.
pub trait HandlerFactory: Send + Sync {
    fn create(&self) -> Box<dyn Handler>;
}

impl<F> HandlerFactory for F
where
    F: Fn() -> Box<dyn Handler> + Send + Sync,
{
    fn create(&self) -> Box<dyn Handler> {
        self()
    }
}
