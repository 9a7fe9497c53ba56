use crate::models::FailureKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Retry scheduling for payment attempts.
///
/// Delay growth is exponential: `initial_delay * backoff_multiplier^(n-1)`,
/// capped at `max_delay`, then jittered uniformly by `jitter_percent` of the
/// capped value so synchronized clients don't retry in lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts including the initial one. Invariant: >= 1.
    pub max_attempts: u32,
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction in [0, 1], e.g. 0.10 for ±10%.
    pub jitter_percent: f64,
    /// Failure classifications worth another attempt.
    pub retriable: HashSet<FailureKind>,
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(v.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

fn transient_failures() -> HashSet<FailureKind> {
    [
        FailureKind::NetworkError,
        FailureKind::GatewayTimeout,
        FailureKind::GatewayError,
        FailureKind::RateLimited,
        FailureKind::TemporaryDecline,
    ]
    .into_iter()
    .collect()
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter_percent: 0.10,
            retriable: transient_failures(),
        }
    }
}

impl RetryPolicy {
    /// Tighter schedule for flaky but fast processors.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 1.5,
            jitter_percent: 0.15,
            retriable: transient_failures(),
        }
    }

    /// Few, widely spaced attempts; retries only unambiguous transport faults.
    pub fn conservative() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(600),
            backoff_multiplier: 3.0,
            jitter_percent: 0.05,
            retriable: [FailureKind::NetworkError, FailureKind::GatewayTimeout]
                .into_iter()
                .collect(),
        }
    }

    pub fn is_retriable(&self, kind: FailureKind) -> bool {
        self.retriable.contains(&kind)
    }

    /// Pre-jitter delay scheduled after attempt `attempt_number` (1-based).
    /// Non-decreasing in the attempt number up to the cap.
    pub fn base_delay(&self, attempt_number: u32) -> Duration {
        if attempt_number >= self.max_attempts {
            return Duration::ZERO;
        }
        let exponent = attempt_number.saturating_sub(1) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Delay to sleep after attempt `attempt_number`, jittered.
    ///
    /// Returns zero once the attempt budget is exhausted, which callers treat
    /// as the stop signal. The jittered value is floored at `initial_delay`.
    pub fn next_delay(&self, attempt_number: u32) -> Duration {
        let base = self.base_delay(attempt_number);
        if base.is_zero() {
            return Duration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(-self.jitter_percent..=self.jitter_percent);
        let jittered = base.as_secs_f64() * (1.0 + jitter);
        Duration::from_secs_f64(jittered.max(self.initial_delay.as_secs_f64()))
    }
}
