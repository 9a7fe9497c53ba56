use crate::observability::get_metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failure-isolation state of one gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive successes in HalfOpen before the circuit closes.
    pub success_threshold: u32,
    /// Informational per-call bound; enforcement happens via the caller's
    /// own timeout around the operation.
    pub call_timeout: Duration,
    /// Cooldown in Open before the next call may probe.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            call_timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker for admin stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSnapshot {
    pub gateway: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// Rejected without invoking the operation.
    #[error("circuit breaker '{0}' is open")]
    Open(String),
    /// The operation ran and failed; already recorded against the breaker.
    #[error("{0}")]
    Operation(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    last_transition: Instant,
    last_state_change: DateTime<Utc>,
}

/// Per-gateway circuit breaker.
///
/// Counters reset to zero on every state transition. The Open -> HalfOpen
/// flip is observed lazily by the next `can_execute` call and happens under
/// the write lock, so a concurrent reader can never act on a stale Open.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
                last_transition: Instant::now(),
                last_state_change: Utc::now(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().unwrap().state
    }

    /// Whether a call may proceed right now.
    pub fn can_execute(&self) -> bool {
        self.can_execute_at(Instant::now())
    }

    /// Deterministic variant taking the current instant, so elapsed cooldowns
    /// can be simulated without sleeping.
    pub fn can_execute_at(&self, now: Instant) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if now.duration_since(inner.last_transition) >= self.config.reset_timeout {
                    Self::transition(&self.name, &mut inner, CircuitState::HalfOpen, now);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.record_success_at(Instant::now());
    }

    pub fn record_success_at(&self, now: Instant) {
        let mut inner = self.inner.write().unwrap();
        match inner.state {
            CircuitState::Closed => {
                // A success ends any failure streak.
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    Self::transition(&self.name, &mut inner, CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {
                // Unreachable through execute(): Open rejects before the call.
                tracing::debug!(breaker = %self.name, "success observed while open; ignored");
            }
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.inner.write().unwrap();
        inner.last_failure_at = Some(Utc::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    Self::transition(&self.name, &mut inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                Self::transition(&self.name, &mut inner, CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Gates `op` through the breaker: fails fast when the circuit rejects,
    /// otherwise times the call and records its outcome.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.can_execute() {
            get_metrics().record_circuit_rejection(&self.name);
            return Err(CircuitError::Open(self.name.clone()));
        }

        let started = Instant::now();
        let outcome = op().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        get_metrics().record_gateway_call_latency(&self.name, elapsed_ms);

        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitError::Operation(err))
            }
        }
    }

    /// Forces the breaker back to Closed with cleared counters.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap();
        Self::transition(&self.name, &mut inner, CircuitState::Closed, Instant::now());
        inner.last_failure_at = None;
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.read().unwrap();
        CircuitBreakerSnapshot {
            gateway: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
            last_state_change: inner.last_state_change,
        }
    }

    fn transition(name: &str, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_transition = now;
        inner.last_state_change = Utc::now();
        if from != to {
            tracing::info!(breaker = %name, from = from.as_str(), to = to.as_str(), "circuit transition");
            get_metrics().record_circuit_transition(name, from.as_str(), to.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig::default())
    }

    #[test]
    fn test_opens_after_failure_threshold() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_success_resets_failure_streak_in_closed() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_failure();
        }
        cb.record_success();
        for _ in 0..4 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_reset_timeout() {
        let cb = breaker();
        let t0 = Instant::now();
        for _ in 0..5 {
            cb.record_failure_at(t0);
        }
        assert!(!cb.can_execute_at(t0 + Duration::from_secs(59)));
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.can_execute_at(t0 + Duration::from_secs(61)));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_closes_after_success_threshold() {
        let cb = breaker();
        let t0 = Instant::now();
        for _ in 0..5 {
            cb.record_failure_at(t0);
        }
        let later = t0 + Duration::from_secs(61);
        assert!(cb.can_execute_at(later));

        cb.record_success_at(later);
        cb.record_success_at(later);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success_at(later);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().success_count, 0);
    }

    #[test]
    fn test_half_open_single_failure_reopens() {
        let cb = breaker();
        let t0 = Instant::now();
        for _ in 0..5 {
            cb.record_failure_at(t0);
        }
        let later = t0 + Duration::from_secs(61);
        assert!(cb.can_execute_at(later));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure_at(later);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute_at(later + Duration::from_secs(1)));
    }

    #[test]
    fn test_transitions_reset_counters() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_failure();
        }
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
    }

    #[test]
    fn test_reset_returns_to_closed() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_failure();
        }
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
    }

    #[tokio::test]
    async fn test_execute_fails_fast_when_open() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_failure();
        }

        let result: Result<(), CircuitError<std::io::Error>> =
            cb.execute(|| async { unreachable!("op must not run while open") }).await;
        assert!(matches!(result, Err(CircuitError::Open(_))));
        // Fast-fail is synthetic; it must not advance the failure tally.
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn test_execute_records_outcomes() {
        let cb = breaker();

        let ok: Result<u32, CircuitError<std::io::Error>> = cb.execute(|| async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u32, CircuitError<std::io::Error>> = cb
            .execute(|| async { Err(std::io::Error::other("boom")) })
            .await;
        assert!(matches!(err, Err(CircuitError::Operation(_))));
        assert_eq!(cb.snapshot().failure_count, 1);
    }
}
