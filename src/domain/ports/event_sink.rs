//! Delegation event port.

use crate::domain::models::DelegationEvent;

/// Observability boundary for delegation attempts.
///
/// Called inline on the delegation path, so implementations must not block.
pub trait EventSink: Send + Sync {
    fn record(&self, event: DelegationEvent);
}
