use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use hivelink::domain::models::{AgentRole, CommunicationPath, PrincessDomain};
use hivelink::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitCheckResult};
use hivelink::services::CircuitState;

fn config(threshold: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: threshold,
        cooldown: Duration::seconds(30),
        enabled: true,
    }
}

fn breaker() -> CircuitBreaker {
    CircuitBreaker::new(CommunicationPath::new(
        AgentRole::Queen,
        AgentRole::Princess(PrincessDomain::Security),
    ))
}

fn tripped(threshold: u32) -> (CircuitBreaker, chrono::DateTime<Utc>) {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut b = breaker();
    for _ in 0..threshold {
        b.record_failure_at(start, "boom", &config(threshold));
    }
    (b, start)
}

proptest! {
    /// Property: the circuit opens exactly when consecutive failures reach the threshold
    #[test]
    fn prop_opens_at_threshold(threshold in 1u32..20, failures in 0u32..40) {
        let cfg = config(threshold);
        let now = Utc::now();
        let mut b = breaker();
        for _ in 0..failures {
            b.record_failure_at(now, "boom", &cfg);
        }
        let expected = if failures >= threshold { CircuitState::Open } else { CircuitState::Closed };
        prop_assert_eq!(b.state, expected);
    }

    /// Property: a success anywhere resets the consecutive count
    #[test]
    fn prop_success_resets_count(threshold in 2u32..20, before in 0u32..19) {
        prop_assume!(before < threshold);
        let cfg = config(threshold);
        let now = Utc::now();
        let mut b = breaker();
        for _ in 0..before {
            b.record_failure_at(now, "boom", &cfg);
        }
        b.record_success_at(now);
        for _ in 0..threshold - 1 {
            b.record_failure_at(now, "boom", &cfg);
        }
        prop_assert_eq!(b.state, CircuitState::Closed);
    }

    /// Property: an open circuit blocks every check before the cooldown ends
    #[test]
    fn prop_blocks_during_cooldown(threshold in 1u32..10, offset_ms in 0i64..30_000) {
        let (mut b, opened) = tripped(threshold);
        let result = b.check_at(opened + Duration::milliseconds(offset_ms), &config(threshold));
        prop_assert!(result.is_blocked());
        prop_assert_eq!(b.state, CircuitState::Open);
    }

    /// Property: after the cooldown exactly one probe is admitted
    #[test]
    fn prop_single_probe(threshold in 1u32..10, extra_ms in 0i64..29_000, callers in 2usize..8) {
        let cfg = config(threshold);
        let (mut b, opened) = tripped(threshold);
        let at = opened + cfg.cooldown + Duration::milliseconds(extra_ms);

        let admitted = (0..callers).filter(|_| b.check_at(at, &cfg).is_allowed()).count();
        prop_assert_eq!(admitted, 1);
        prop_assert_eq!(b.state, CircuitState::HalfOpen);
    }

    /// Property: the probe outcome decides the next state
    #[test]
    fn prop_probe_outcome(threshold in 1u32..10, probe_succeeds: bool) {
        let cfg = config(threshold);
        let (mut b, opened) = tripped(threshold);
        let at = opened + cfg.cooldown;
        let is_testing = matches!(b.check_at(at, &cfg), CircuitCheckResult::Testing { .. });
        prop_assert!(is_testing);

        if probe_succeeds {
            b.record_success_at(at);
            prop_assert_eq!(b.state, CircuitState::Closed);
            prop_assert_eq!(b.consecutive_failures, 0);
        } else {
            b.record_failure_at(at, "probe failed", &cfg);
            prop_assert_eq!(b.state, CircuitState::Open);
            prop_assert_eq!(b.opened_at, Some(at));
        }
    }
}

#[test]
fn abandoned_probe_releases_its_slot_after_a_cooldown() {
    let cfg = config(1);
    let (mut b, opened) = tripped(1);
    let probe_at = opened + cfg.cooldown;
    assert!(b.check_at(probe_at, &cfg).is_allowed());
    assert!(b.check_at(probe_at + Duration::seconds(1), &cfg).is_blocked());
    assert!(b.check_at(probe_at + cfg.cooldown, &cfg).is_allowed());
}
