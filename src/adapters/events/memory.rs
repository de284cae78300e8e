//! In-memory event sink with A/B summaries.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::models::{CommunicationPath, DelegationEvent};
use crate::domain::ports::EventSink;

/// Aggregated attempts for one path, split by whether an artifact was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSummary {
    pub path: CommunicationPath,
    pub optimized: bool,
    pub attempts: usize,
    pub successes: usize,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: u64,
}

impl PathSummary {
    /// Share of attempts that succeeded, 0 when there were none.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Keeps every event in memory. Intended for tests and short CLI runs.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DelegationEvent>>,
}

impl MemoryEventSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded event, oldest first.
    pub fn events(&self) -> Vec<DelegationEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Per path and per optimized/baseline statistics, ordered by path.
    pub fn summary(&self) -> Vec<PathSummary> {
        let events = self.events();
        let mut groups: BTreeMap<(CommunicationPath, bool), Vec<&DelegationEvent>> = BTreeMap::new();
        for event in &events {
            groups.entry((event.path, event.optimized)).or_default().push(event);
        }

        groups
            .into_iter()
            .map(|((path, optimized), group)| {
                let mut latencies: Vec<u64> = group.iter().map(|e| e.latency_ms).collect();
                latencies.sort_unstable();
                let total: u64 = latencies.iter().sum();
                PathSummary {
                    path,
                    optimized,
                    attempts: group.len(),
                    successes: group.iter().filter(|e| e.outcome.is_success()).count(),
                    mean_latency_ms: total as f64 / latencies.len() as f64,
                    p95_latency_ms: percentile(&latencies, 0.95),
                }
            })
            .collect()
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
pub(crate) fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: DelegationEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentRole, Outcome, PrincessDomain};
    use uuid::Uuid;

    fn event(latency_ms: u64, optimized: bool, ok: bool) -> DelegationEvent {
        let path = CommunicationPath::new(AgentRole::Queen, AgentRole::Princess(PrincessDomain::Research));
        let outcome = if ok {
            Outcome::Success
        } else {
            Outcome::Failure {
                kind: "timeout".to_string(),
            }
        };
        DelegationEvent::new(path, Uuid::new_v4(), latency_ms, outcome).with_optimization(optimized.then_some(1))
    }

    #[test]
    fn test_summary_splits_optimized_and_baseline() {
        let sink = MemoryEventSink::new();
        for latency in [10, 20, 30, 40] {
            sink.record(event(latency, true, true));
        }
        sink.record(event(100, false, false));
        sink.record(event(50, false, true));

        let summary = sink.summary();
        assert_eq!(summary.len(), 2);

        let baseline = summary.iter().find(|s| !s.optimized).unwrap();
        assert_eq!(baseline.attempts, 2);
        assert_eq!(baseline.successes, 1);
        assert!((baseline.success_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(baseline.p95_latency_ms, 100);

        let optimized = summary.iter().find(|s| s.optimized).unwrap();
        assert_eq!(optimized.attempts, 4);
        assert!((optimized.mean_latency_ms - 25.0).abs() < f64::EPSILON);
        assert_eq!(optimized.p95_latency_ms, 40);
    }

    #[test]
    fn test_percentile() {
        let values: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&values, 0.95), 95);
        assert_eq!(percentile(&values, 0.5), 50);
        assert_eq!(percentile(&[7], 0.95), 7);
        assert_eq!(percentile(&[], 0.95), 0);
    }

    #[test]
    fn test_clear() {
        let sink = MemoryEventSink::new();
        sink.record(event(1, false, true));
        assert_eq!(sink.len(), 1);
        sink.clear();
        assert!(sink.is_empty());
    }
}
