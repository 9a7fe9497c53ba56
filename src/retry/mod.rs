pub mod policy;

pub use policy::RetryPolicy;

use crate::models::FailureKind;
use std::future::Future;

/// Runs `op` under the given policy, classifying each error and sleeping the
/// scheduled backoff between attempts.
///
/// The closure receives the 1-based attempt number. Sleeps use
/// `tokio::time::sleep`, so dropping the returned future cancels any pending
/// wait along with the in-flight attempt. Useful beyond gateway calls, e.g.
/// for optimistic-lock conflicts against a result store.
pub async fn retry_with_policy<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    classify: C,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> FailureKind,
{
    let mut attempt: u32 = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let kind = classify(&err);
                let delay = policy.next_delay(attempt);
                if !policy.is_retriable(kind) || delay.is_zero() {
                    return Err(err);
                }
                tracing::debug!(
                    attempt,
                    failure = %kind,
                    delay_ms = delay.as_millis() as u64,
                    "retrying operation after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
