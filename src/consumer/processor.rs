use async_trait::async_trait;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

use crate::interface::{
    handler::Handler,
    processor::{InitializationInput, ProcessRecordsInput, RecordProcessor, ShutdownInput, ShutdownReason},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Initialized,
    Processing,
    ShuttingDown,
    Terminated,
}

/// Feeds every record of a batch to its handler, then checkpoints the batch.
///
/// Handler and checkpoint failures are logged and never stop the shard.
pub struct HandlerRecordProcessor {
    handler: Box<dyn Handler>,
    state: ProcessorState,
    span: Span,
}

impl HandlerRecordProcessor {
    pub fn new(handler: Box<dyn Handler>) -> Self {
        Self::with_span(handler, info_span!("record_processor", shard_id = field::Empty))
    }

    /// The span should declare an empty `shard_id` field; it is filled in on
    /// initialization.
    pub fn with_span(handler: Box<dyn Handler>, span: Span) -> Self {
        Self {
            handler,
            state: ProcessorState::Initialized,
            span,
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    async fn dispatch(&mut self, input: ProcessRecordsInput) {
        debug!(records = input.records.len(), "processing records");
        let last = match input.records.last() {
            Some(record) => record.sequence_number.clone(),
            None => return,
        };

        for record in input.records {
            if let Err(err) = self.handler.handle(record.data).await {
                warn!(
                    error = %err,
                    sequence_number = %record.sequence_number,
                    "handler failed to process record"
                );
            }
        }

        // De-aggregated records share a sequence number, so progress is only
        // recorded at the end of the batch.
        debug!(
            checkpoint = %last,
            millis_behind_latest = ?input.millis_behind_latest,
            "checkpointing progress"
        );
        if let Err(err) = input.checkpointer.checkpoint(Some(&last)).await {
            error!(error = %err, checkpoint = %last, "error checkpointing progress");
        }
    }

    async fn terminate(&mut self, input: ShutdownInput) {
        self.state = ProcessorState::ShuttingDown;
        info!(reason = %input.reason, "shutting record processor down");

        if input.reason == ShutdownReason::Terminate {
            if let Err(err) = input.checkpointer.checkpoint(None).await {
                error!(error = %err, "error checkpointing shard end");
            }
        }
        self.state = ProcessorState::Terminated;
    }
}

#[async_trait]
impl RecordProcessor for HandlerRecordProcessor {
    async fn initialize(&mut self, input: InitializationInput) {
        self.span.record("shard_id", input.shard_id.as_str());
        let checkpoint = input
            .checkpoint
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        debug!(
            parent: &self.span,
            shard_id = %input.shard_id,
            checkpoint = %checkpoint,
            "initializing record processor"
        );
        self.state = ProcessorState::Processing;
    }

    async fn process_records(&mut self, input: ProcessRecordsInput) {
        if matches!(self.state, ProcessorState::ShuttingDown | ProcessorState::Terminated) {
            warn!(parent: &self.span, records = input.records.len(), "ignoring records delivered after shutdown");
            return;
        }
        self.state = ProcessorState::Processing;
        let span = self.span.clone();
        self.dispatch(input).instrument(span).await
    }

    async fn shutdown(&mut self, input: ShutdownInput) {
        if self.state == ProcessorState::Terminated {
            warn!(parent: &self.span, reason = %input.reason, "record processor already terminated");
            return;
        }
        let span = self.span.clone();
        self.terminate(input).instrument(span).await
    }
}
