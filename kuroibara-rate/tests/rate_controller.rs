use std::time::Duration;

use kuroibara_rate::{Priority, RateController};
use kuroibara_types::{KuroibaraError, RateConfig};

fn tiny_config() -> RateConfig {
    RateConfig {
        rate: 1.0,
        window: Duration::from_secs(1),
        burst: 1,
        min_interval: Duration::ZERO,
        max_queue_depth: 2,
        max_wait: Duration::from_millis(200),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn first_request_is_admitted_immediately() {
    let controller = RateController::new();
    controller.register_source("mangasource", tiny_config()).await;

    let permit = controller
        .acquire("mangasource", Priority::NORMAL, Duration::from_millis(50))
        .await
        .expect("burst token available");
    assert!(permit.deadline() > std::time::Instant::now());
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_request_is_eventually_admitted() {
    let controller = RateController::new();
    let mut cfg = tiny_config();
    cfg.rate = 20.0;
    cfg.burst = 1;
    controller.register_source("mangasource", cfg).await;

    let _first = controller
        .acquire("mangasource", Priority::NORMAL, Duration::from_millis(50))
        .await
        .expect("first burst token available");

    let second = controller
        .acquire("mangasource", Priority::NORMAL, Duration::from_millis(500))
        .await;
    assert!(second.is_ok(), "second request should be admitted after refill");
}

#[tokio::test(flavor = "multi_thread")]
async fn unregistered_source_is_not_found() {
    let controller = RateController::new();
    let err = controller
        .acquire("ghost", Priority::NORMAL, Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, KuroibaraError::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_full_rejects_immediately() {
    let controller = RateController::new();
    let mut cfg = tiny_config();
    cfg.rate = 0.001;
    cfg.burst = 1;
    cfg.max_queue_depth = 1;
    controller.register_source("slow", cfg).await;

    let _first = controller
        .acquire("slow", Priority::NORMAL, Duration::from_millis(10))
        .await
        .expect("burst token available");

    let _second = controller.acquire("slow", Priority::NORMAL, Duration::from_millis(5000));
    let third = controller
        .acquire("slow", Priority::NORMAL, Duration::from_millis(5))
        .await;
    assert!(matches!(third, Err(KuroibaraError::RateLimited { .. })));
}
