use tracing::{field, info, info_span, Span};

use super::processor::HandlerRecordProcessor;
use crate::interface::{handler::HandlerFactory, processor::RecordProcessor};

/// Builds the record processor for one shard assignment.
pub trait RecordProcessorFactory: Send + Sync {
    fn create_processor(&self) -> Box<dyn RecordProcessor>;
}

impl<F> RecordProcessorFactory for F
where
    F: Fn() -> Box<dyn RecordProcessor> + Send + Sync,
{
    fn create_processor(&self) -> Box<dyn RecordProcessor> {
        self()
    }
}

/// Binds every new processor to a handler of its own, so no state is shared
/// between shards.
pub struct HandlerProcessorFactory<H> {
    handlers: H,
    span: Span,
}

impl<H: HandlerFactory> HandlerProcessorFactory<H> {
    pub fn new(handlers: H) -> Self {
        info!("creating record processor factory");
        Self {
            handlers,
            span: info_span!("consumer"),
        }
    }

    /// Processor spans are created as children of `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl<H: HandlerFactory> RecordProcessorFactory for HandlerProcessorFactory<H> {
    fn create_processor(&self) -> Box<dyn RecordProcessor> {
        info!(parent: &self.span, "creating record processor");
        let span = info_span!(parent: &self.span, "record_processor", shard_id = field::Empty);
        Box::new(HandlerRecordProcessor::with_span(self.handlers.create(), span))
    }
}
