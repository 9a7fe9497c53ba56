use payment_engine::circuit::CircuitBreakerManager;
use payment_engine::config::Settings;
use payment_engine::gateway::{PaymentGatewayManager, SimulatedGateway, SimulatedGatewayConfig};
use payment_engine::idempotency::{CleanupTask, IdempotencyManager};
use payment_engine::models::{PaymentMethod, PaymentRequest};
use payment_engine::observability::{init_logging, init_metrics, HealthChecker, LogConfig};
use payment_engine::repositories::InMemoryPaymentRepository;
use payment_engine::services::PaymentService;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::new()?;

    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: settings.application.log_format.as_str().into(),
        include_target: true,
    });
    init_metrics()?;
    info!("Configuration loaded");

    // Wire the engine the way an embedding service would.
    let gateways = Arc::new(PaymentGatewayManager::new(settings.health_check_timeout()));
    gateways.register(Arc::new(SimulatedGateway::new(SimulatedGatewayConfig {
        kind: settings.payment.default_gateway.clone(),
        failure_rate: 0.2,
        seed: Some(1),
        ..SimulatedGatewayConfig::default()
    })));

    let breakers = Arc::new(CircuitBreakerManager::new(settings.circuit_breaker_config()));
    let idempotency = Arc::new(IdempotencyManager::new(settings.idempotency_config()));
    let cleanup = CleanupTask::spawn(
        Arc::clone(&idempotency),
        Duration::from_secs(settings.idempotency.cleanup_interval_seconds),
    );
    let repository = Arc::new(InMemoryPaymentRepository::new());

    let service = PaymentService::new(
        Arc::clone(&gateways),
        Arc::clone(&breakers),
        Arc::clone(&idempotency),
        repository,
        settings.retry_policy(),
        settings.payment_service_config(),
    );

    let health = HealthChecker::new(Arc::clone(&gateways)).check().await;
    info!(status = ?health.status, "Gateway health verified");

    // Startup verification: drive one submission end to end.
    let request = PaymentRequest::new(
        "startup-check",
        "order-startup",
        Decimal::new(1999, 2),
        "USD",
        PaymentMethod::Card,
    );
    let result = service.process_payment(request).await?;
    info!(
        payment_id = %result.payment_id,
        status = result.status.as_str(),
        attempts = result.attempt_count(),
        "Startup payment verification complete"
    );

    for snapshot in service.circuit_stats() {
        info!(gateway = %snapshot.gateway, state = ?snapshot.state, "Circuit breaker state");
    }

    cleanup.stop().await;
    info!("Shutdown complete");
    Ok(())
}
