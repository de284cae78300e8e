//! Event sink implementations.

pub mod memory;
pub mod tracing_sink;

pub use memory::{MemoryEventSink, PathSummary};
pub use tracing_sink::TracingEventSink;
