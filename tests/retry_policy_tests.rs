use payment_engine::models::FailureKind;
use payment_engine::retry::{retry_with_policy, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[test]
fn test_base_delay_is_non_decreasing_up_to_cap() {
    for policy in [
        RetryPolicy::default(),
        RetryPolicy::aggressive(),
        RetryPolicy::conservative(),
    ] {
        let mut previous = Duration::ZERO;
        for attempt in 1..policy.max_attempts {
            let delay = policy.base_delay(attempt);
            assert!(
                delay >= previous,
                "base delay decreased at attempt {attempt}"
            );
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
    }
}

#[test]
fn test_jittered_delay_within_bounds_for_all_presets() {
    for policy in [
        RetryPolicy::default(),
        RetryPolicy::aggressive(),
        RetryPolicy::conservative(),
    ] {
        let lower = policy.initial_delay.as_secs_f64() * (1.0 - policy.jitter_percent);
        let upper = policy.max_delay.as_secs_f64() * (1.0 + policy.jitter_percent);
        for attempt in 1..policy.max_attempts {
            for _ in 0..20 {
                let delay = policy.next_delay(attempt).as_secs_f64();
                assert!(delay >= lower, "{delay} < {lower}");
                assert!(delay <= upper, "{delay} > {upper}");
            }
        }
    }
}

#[test]
fn test_default_schedule_spot_checks() {
    let policy = RetryPolicy::default();

    let d1 = policy.next_delay(1).as_secs_f64();
    assert!((0.9..=1.1).contains(&d1), "delay(1) = {d1}");

    let d3 = policy.next_delay(3).as_secs_f64();
    assert!((3.6..=4.4).contains(&d3), "delay(3) = {d3}");

    assert_eq!(policy.next_delay(6), Duration::ZERO);
}

#[test]
fn test_stop_signal_at_max_attempts() {
    let policy = RetryPolicy {
        max_attempts: 3,
        ..RetryPolicy::default()
    };
    assert!(!policy.base_delay(2).is_zero());
    assert!(policy.base_delay(3).is_zero());
    assert!(policy.next_delay(3).is_zero());
    assert!(policy.next_delay(4).is_zero());
}

#[tokio::test(start_paused = true)]
async fn test_helper_applies_schedule_to_arbitrary_operations() {
    // The same scheduling handles non-gateway work, here a store hitting
    // optimistic-lock conflicts classified as temporary declines.
    #[derive(Debug)]
    struct VersionConflict;

    let policy = RetryPolicy::default();
    let attempts = AtomicU32::new(0);

    let outcome = retry_with_policy(
        &policy,
        |_e: &VersionConflict| FailureKind::TemporaryDecline,
        |_attempt| {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 4 {
                    Err(VersionConflict)
                } else {
                    Ok("committed")
                }
            }
        },
    )
    .await;

    assert_eq!(outcome.unwrap(), "committed");
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_helper_backoff_wait_is_cancellable() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_secs(60),
        ..RetryPolicy::default()
    };
    let attempts = AtomicU32::new(0);

    // The first failure schedules a 60s sleep; the caller's 1s deadline
    // must cut the wait short instead of letting it run.
    let retrying = retry_with_policy(
        &policy,
        |_e: &()| FailureKind::NetworkError,
        |_attempt| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), ()>(()) }
        },
    );

    let raced = tokio::time::timeout(Duration::from_secs(1), retrying).await;
    assert!(raced.is_err(), "deadline should expire during the backoff");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
