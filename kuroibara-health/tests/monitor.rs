use std::sync::Arc;

use kuroibara_health::HealthMonitor;
use kuroibara_middleware::Admissibility;
use kuroibara_mock::MockSourceBuilder;

#[tokio::test]
async fn newly_registered_source_is_inadmissible_before_its_first_probe() {
    let monitor = HealthMonitor::new();
    let source = MockSourceBuilder::new("mangasource").build();
    monitor.register_source(source.descriptor(), source, 5);
    assert!(!monitor.is_admissible("mangasource"));
}

#[tokio::test]
async fn successful_probe_makes_the_source_admissible() {
    let monitor = HealthMonitor::new();
    let source = MockSourceBuilder::new("mangasource").build();
    monitor.register_source(source.descriptor(), source, 5);

    monitor.probe_one("mangasource").await;

    assert!(monitor.is_admissible("mangasource"));
    let status = monitor.status("mangasource").unwrap();
    assert_eq!(status.total_probes, 1);
    assert_eq!(status.successful_probes, 1);
}

#[tokio::test]
async fn three_consecutive_failures_mark_the_source_down() {
    let monitor = HealthMonitor::new();
    let source = MockSourceBuilder::new("mangasource").probe_fails().build();
    monitor.register_source(source.descriptor(), source, 5);

    for _ in 0..3 {
        monitor.probe_one("mangasource").await;
    }

    assert!(!monitor.is_admissible("mangasource"));
    let status = monitor.status("mangasource").unwrap();
    assert_eq!(status.consecutive_failures, 3);
}

#[tokio::test]
async fn disabled_source_stays_inadmissible_even_after_a_manual_probe() {
    let monitor = HealthMonitor::new();
    let source = MockSourceBuilder::new("mangasource").build();
    monitor.register_source(source.descriptor(), source, 5);
    monitor.probe_one("mangasource").await;
    assert!(monitor.is_admissible("mangasource"));

    monitor.disable("mangasource");
    assert!(!monitor.is_admissible("mangasource"));

    monitor.probe_one("mangasource").await;
    assert!(!monitor.is_admissible("mangasource"));
}
