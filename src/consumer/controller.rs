use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument, Span};

use crate::{error::StartError, interface::runtime::WorkerRuntime};

/// Lifecycle façade over a [`WorkerRuntime`]. Holds no processing state.
pub struct ConsumerController<R> {
    runtime: R,
    span: Span,
}

impl<R: WorkerRuntime> ConsumerController<R> {
    pub fn new(runtime: R) -> Self {
        info!("creating stream consumer controller");
        Self {
            runtime,
            span: info_span!("consumer_controller"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Starts the runtime and returns once it is consuming.
    ///
    /// An already cancelled token shuts the runtime down instead and counts as
    /// success; so does cancellation while the runtime is still starting.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), StartError> {
        async {
            info!("starting stream consumer");
            if cancel.is_cancelled() {
                info!("cancelled before start");
                self.stop().await;
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cancelled while starting");
                    self.stop().await;
                    Ok(())
                }
                started = self.runtime.start() => match started {
                    Ok(()) => {
                        info!("stream consumer started");
                        Ok(())
                    }
                    Err(err) => {
                        error!(error = %err, "something went wrong when trying to start the stream worker");
                        Err(StartError(err))
                    }
                },
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Starts, consumes until `cancel` fires, then shuts down.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), StartError> {
        self.start(&cancel).await?;
        cancel.cancelled().await;
        self.shutdown().await;
        Ok(())
    }

    /// Stops the runtime. Safe after a failed start and when called twice.
    pub async fn shutdown(&self) {
        self.stop().instrument(self.span.clone()).await
    }

    async fn stop(&self) {
        info!("shutting down stream consumer");
        self.runtime.shutdown().await;
        info!("stream consumer has been stopped");
    }
}
