use std::sync::Arc;

use kuroibara_types::{AdapterKind, CapabilitySet, HealthState, SourceDescriptor, SourceStatus, Tier};
use proptest::prelude::*;

fn arb_descriptor() -> impl Strategy<Value = Arc<SourceDescriptor>> {
    Just(Arc::new(SourceDescriptor {
        id: "probe-source".to_string(),
        name: "Probe Source".to_string(),
        base_origin: "https://probe.example".to_string(),
        tier: Tier::Primary,
        capabilities: CapabilitySet::default(),
        adapter_kind: AdapterKind::Custom,
        priority: 0,
        supports_nsfw: false,
        requires_solver: false,
        config: None,
    }))
}

fn arb_state() -> impl Strategy<Value = HealthState> {
    prop_oneof![
        Just(HealthState::Active),
        Just(HealthState::Degraded),
        Just(HealthState::Down),
        Just(HealthState::Unknown),
        Just(HealthState::Testing),
        Just(HealthState::Disabled),
    ]
}

fn arb_status() -> impl Strategy<Value = SourceStatus> {
    (arb_descriptor(), arb_state(), 0u64..1000, 0u32..20, 3u32..10).prop_map(
        |(descriptor, state, total, consecutive_failures, failure_threshold)| {
            let successful = if total == 0 { 0 } else { total / 2 };
            let mut status = SourceStatus::initial(descriptor, 15);
            status.state = state;
            status.total_probes = total;
            status.successful_probes = successful;
            status.consecutive_failures = if state == HealthState::Down {
                failure_threshold + consecutive_failures
            } else {
                consecutive_failures.min(failure_threshold.saturating_sub(1))
            };
            status.failure_threshold = failure_threshold;
            status
        },
    )
}

proptest! {
    #[test]
    fn status_invariants_always_hold(status in arb_status()) {
        prop_assert!(status.invariants_hold());
    }

    #[test]
    fn uptime_percent_is_bounded(status in arb_status()) {
        let uptime = status.uptime_percent();
        prop_assert!((0.0..=100.0).contains(&uptime));
    }

    #[test]
    fn down_state_implies_threshold_breached(status in arb_status()) {
        if status.state == HealthState::Down {
            prop_assert!(status.consecutive_failures >= status.failure_threshold);
        }
    }
}
