//! Null event sink implementation.
//!
//! Used when delegation events are not observed but the transport still
//! requires an `EventSink`.

use super::EventSink;
use crate::domain::models::DelegationEvent;

/// An event sink that drops everything.
#[derive(Debug, Clone, Default)]
pub struct NullEventSink;

impl NullEventSink {
    /// Sink that drops everything.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for NullEventSink {
    fn record(&self, _event: DelegationEvent) {}
}
