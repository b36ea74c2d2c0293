pub mod handler;
pub mod processor;
pub mod record;
pub mod runtime;
