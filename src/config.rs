use crate::circuit::CircuitBreakerConfig;
use crate::idempotency::IdempotencyConfig;
use crate::retry::RetryPolicy;
use crate::services::PaymentServiceConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub payment: PaymentSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub idempotency: IdempotencySettings,
    pub retry: RetrySettings,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub log_level: String,
    pub log_format: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentSettings {
    pub default_gateway: String,
    pub attempt_timeout_secs: u64,
    pub health_check_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub call_timeout_secs: u64,
    pub reset_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct IdempotencySettings {
    pub ttl_seconds: i64,
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_percent: f64,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker.failure_threshold,
            success_threshold: self.circuit_breaker.success_threshold,
            call_timeout: Duration::from_secs(self.circuit_breaker.call_timeout_secs),
            reset_timeout: Duration::from_secs(self.circuit_breaker.reset_timeout_secs),
        }
    }

    pub fn idempotency_config(&self) -> IdempotencyConfig {
        IdempotencyConfig {
            ttl_seconds: self.idempotency.ttl_seconds,
            cleanup_interval_seconds: self.idempotency.cleanup_interval_seconds,
        }
    }

    /// Retriable classifications come from the policy default; only the
    /// numeric schedule is configurable.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
            jitter_percent: self.retry.jitter_percent,
            ..RetryPolicy::default()
        }
    }

    pub fn payment_service_config(&self) -> PaymentServiceConfig {
        PaymentServiceConfig {
            default_gateway: self.payment.default_gateway.clone(),
            attempt_timeout: Duration::from_secs(self.payment.attempt_timeout_secs),
        }
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.payment.health_check_timeout_secs)
    }
}
