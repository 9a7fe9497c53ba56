#![allow(dead_code)]

use payment_engine::circuit::{CircuitBreakerConfig, CircuitBreakerManager};
use payment_engine::gateway::{
    PaymentGateway, PaymentGatewayManager, SimulatedGateway, SimulatedGatewayConfig,
};
use payment_engine::idempotency::{IdempotencyConfig, IdempotencyManager};
use payment_engine::models::{PaymentMethod, PaymentRequest};
use payment_engine::repositories::{InMemoryPaymentRepository, PaymentResultRepository};
use payment_engine::retry::RetryPolicy;
use payment_engine::services::{PaymentService, PaymentServiceConfig};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

pub const GATEWAY: &str = "simulated";

/// Service wired against a single scripted gateway, with fast retries so
/// paused-clock tests finish instantly.
pub struct TestHarness {
    pub service: Arc<PaymentService>,
    pub gateway: Arc<SimulatedGateway>,
    pub breakers: Arc<CircuitBreakerManager>,
    pub idempotency: Arc<IdempotencyManager>,
    pub repository: Arc<InMemoryPaymentRepository>,
}

pub fn harness() -> TestHarness {
    harness_with_policy(fast_policy())
}

pub fn harness_with_policy(policy: RetryPolicy) -> TestHarness {
    let gateway = Arc::new(SimulatedGateway::new(SimulatedGatewayConfig {
        kind: GATEWAY.to_string(),
        base_latency: Duration::ZERO,
        failure_rate: 0.0,
        seed: Some(42),
        ..SimulatedGatewayConfig::default()
    }));

    let gateways = Arc::new(PaymentGatewayManager::new(Duration::from_secs(5)));
    gateways.register(Arc::clone(&gateway) as Arc<dyn PaymentGateway>);

    let breakers = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));
    let idempotency = Arc::new(IdempotencyManager::new(IdempotencyConfig::default()));
    let repository = Arc::new(InMemoryPaymentRepository::new());

    let service = Arc::new(PaymentService::new(
        gateways,
        Arc::clone(&breakers),
        Arc::clone(&idempotency),
        Arc::clone(&repository) as Arc<dyn PaymentResultRepository>,
        policy,
        PaymentServiceConfig {
            default_gateway: GATEWAY.to_string(),
            attempt_timeout: Duration::from_secs(30),
        },
    ));

    TestHarness {
        service,
        gateway,
        breakers,
        idempotency,
        repository,
    }
}

/// Default schedule compressed to milliseconds.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        backoff_multiplier: 2.0,
        jitter_percent: 0.10,
        ..RetryPolicy::default()
    }
}

pub fn payment_request(key: &str) -> PaymentRequest {
    PaymentRequest::new(key, "order-1", dec!(49.99), "USD", PaymentMethod::Card)
}
