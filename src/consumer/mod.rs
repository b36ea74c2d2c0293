pub mod controller;
pub mod factory;
pub mod processor;

pub use controller::ConsumerController;
pub use factory::{HandlerProcessorFactory, RecordProcessorFactory};
pub use processor::{HandlerRecordProcessor, ProcessorState};
