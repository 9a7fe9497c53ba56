mod common;

use chrono::{Duration, Utc};
use common::payment_request;
use payment_engine::idempotency::{
    CleanupTask, IdempotencyCheckResult, IdempotencyConfig, IdempotencyManager,
};
use payment_engine::models::PaymentResult;
use payment_engine::AppError;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn manager() -> IdempotencyManager {
    IdempotencyManager::new(IdempotencyConfig::default())
}

#[test]
fn test_miss_then_hit() {
    let manager = manager();
    let request = payment_request("abc");

    assert!(matches!(
        manager.check(&request).unwrap(),
        IdempotencyCheckResult::Miss
    ));

    let mut result = PaymentResult::new("abc");
    result.complete();
    manager.store(&request, &result);

    match manager.check(&request).unwrap() {
        IdempotencyCheckResult::Hit(cached) => {
            assert_eq!(cached.payment_id, result.payment_id);
            assert!(cached.success);
        }
        other => panic!("expected hit, got {other:?}"),
    }
}

#[test]
fn test_hash_mismatch_is_conflict_not_miss() {
    let manager = manager();
    let request = payment_request("abc");
    let mut result = PaymentResult::new("abc");
    result.complete();
    manager.store(&request, &result);

    let mut altered = payment_request("abc");
    altered.amount = dec!(999.99);

    let err = manager.check(&altered).unwrap_err();
    assert!(matches!(err, AppError::IdempotencyConflict { .. }));

    // The stored record is untouched and still serves the original payload.
    assert!(matches!(
        manager.check(&request).unwrap(),
        IdempotencyCheckResult::Hit(_)
    ));
    assert_eq!(manager.metrics().snapshot().conflicts, 1);
}

#[test]
fn test_ttl_expiry_window() {
    // TTL=24h, stored at t0: a lookup at t0+23h hits, at t0+25h misses.
    let manager = manager();
    let request = payment_request("abc");
    let t0 = Utc::now();

    let mut result = PaymentResult::new("abc");
    result.complete();
    manager.store_at(&request, &result, t0);

    assert!(matches!(
        manager.check_at(&request, t0 + Duration::hours(23)).unwrap(),
        IdempotencyCheckResult::Hit(_)
    ));
    assert!(matches!(
        manager.check_at(&request, t0 + Duration::hours(25)).unwrap(),
        IdempotencyCheckResult::Miss
    ));
    // The expired record was purged on sight.
    assert_eq!(manager.stats().total, 0);
}

#[test]
fn test_cleanup_sweep_and_stats() {
    let manager = manager();
    let t0 = Utc::now();

    for (i, key) in ["a", "b", "c"].iter().enumerate() {
        let mut request = payment_request(key);
        request.order_id = format!("order-{i}");
        let mut result = PaymentResult::new(*key);
        result.complete();
        manager.store_at(&request, &result, t0);
    }

    let later = t0 + Duration::hours(25);
    let stats = manager.stats_at(later);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.expired, 3);

    assert_eq!(manager.cleanup_expired_at(later), 3);
    assert_eq!(manager.stats_at(later).total, 0);
    // Idempotent: nothing left to remove.
    assert_eq!(manager.cleanup_expired_at(later), 0);
}

#[test]
fn test_remove_specific_record() {
    let manager = manager();
    let request = payment_request("abc");
    let result = PaymentResult::new("abc");
    manager.store(&request, &result);

    assert!(manager.remove("abc"));
    assert!(!manager.remove("abc"));
    assert!(matches!(
        manager.check(&request).unwrap(),
        IdempotencyCheckResult::Miss
    ));
}

#[test]
fn test_update_refreshes_cached_result() {
    let manager = manager();
    let request = payment_request("abc");
    let mut result = PaymentResult::new("abc");
    manager.store(&request, &result);

    result.complete();
    manager.update("abc", &result);

    match manager.check(&request).unwrap() {
        IdempotencyCheckResult::Hit(cached) => assert!(cached.success),
        other => panic!("expected hit, got {other:?}"),
    }
}

#[test]
fn test_metrics_counters() {
    let manager = manager();
    let request = payment_request("abc");

    let _ = manager.check(&request);
    let mut result = PaymentResult::new("abc");
    result.complete();
    manager.store(&request, &result);
    let _ = manager.check(&request);

    let snapshot = manager.metrics().snapshot();
    assert_eq!(snapshot.checks, 2);
    assert_eq!(snapshot.misses, 1);
    assert_eq!(snapshot.hits, 1);
    assert!(snapshot.hit_rate() > 0.49 && snapshot.hit_rate() < 0.51);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_task_sweeps_and_stops_cooperatively() {
    let manager = Arc::new(IdempotencyManager::new(IdempotencyConfig::default()));

    // Backdate the record past its TTL so the next sweep removes it.
    let request = payment_request("stale");
    let result = PaymentResult::new("stale");
    manager.store_at(&request, &result, Utc::now() - Duration::hours(25));
    assert_eq!(manager.stats().total, 1);

    let task = CleanupTask::spawn(Arc::clone(&manager), std::time::Duration::from_secs(3600));

    // Advance the paused clock past one sweep interval.
    tokio::time::sleep(std::time::Duration::from_secs(3601)).await;
    assert_eq!(manager.stats().total, 0);

    task.stop().await;
}
