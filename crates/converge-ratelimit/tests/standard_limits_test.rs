//! Standard quota behaviour under concurrent callers

use converge_ratelimit::{CancellationToken, RateLimitConfig, RateLimitKey, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_compute_quota_paces_concurrent_callers() {
    let composite = Arc::new(RateLimitConfig::standard().build().unwrap());
    let cancel = CancellationToken::new();
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..4 {
        let composite = Arc::clone(&composite);
        let cancel = cancel.clone();
        let service = if i % 2 == 0 { "HealthChecks" } else { "BackendServices" };
        handles.push(tokio::spawn(async move {
            let key = RateLimitKey::new("proj-1", service, "Insert", "ga");
            composite.accept(&cancel, &key).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Four callers sharing one quota need three periods. The timer
    // works at millisecond resolution, hence the slack.
    let period = Duration::from_secs(60) / 1300;
    let elapsed = start.elapsed();
    assert!(elapsed >= period * 3, "elapsed {elapsed:?}");
    assert!(elapsed < period * 3 + Duration::from_millis(5), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_default_minimum_spacing() {
    let composite = RateLimitConfig::standard().build().unwrap();
    let cancel = CancellationToken::new();
    let key = RateLimitKey::new("proj-1", "Addresses", "Get", "ga");

    let start = Instant::now();
    composite.accept(&cancel, &key).await.unwrap();
    composite.accept(&cancel, &key).await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_operations_spacing_behind_busy_network_services() {
    let composite = Arc::new(RateLimitConfig::standard().build().unwrap());
    let cancel = CancellationToken::new();
    let start = Instant::now();
    composite
        .accept(&cancel, &RateLimitKey::new("proj-1", "Meshes", "Get", "ga"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let composite = Arc::clone(&composite);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let key = RateLimitKey::new("proj-1", "Operations", "Get", "ga");
            composite.accept(&cancel, &key).await.unwrap();
            start.elapsed()
        }));
    }
    let mut admitted = Vec::new();
    for handle in handles {
        admitted.push(handle.await.unwrap());
    }
    admitted.sort();

    assert!(admitted[1] - admitted[0] >= Duration::from_millis(100), "admitted {admitted:?}");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_waiters() {
    let config = RateLimitConfig::parse(
        "limiter \"slow\" limit=1 interval=\"1h\"\nregister \"HealthChecks\" limiter=\"slow\"",
    )
    .unwrap();
    let composite = Arc::new(config.build().unwrap());
    let cancel = CancellationToken::new();
    let key = RateLimitKey::new("proj-1", "HealthChecks", "Get", "ga");
    composite.accept(&cancel, &key).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let composite = Arc::clone(&composite);
        let cancel = cancel.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move { composite.accept(&cancel, &key).await }));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }
}
