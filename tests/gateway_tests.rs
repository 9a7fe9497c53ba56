use payment_engine::gateway::{
    ChargeRequest, GatewayError, GatewayResponse, PaymentGateway, PaymentGatewayManager,
    RefundRequest, SimulatedGateway, SimulatedGatewayConfig,
};
use payment_engine::models::{FailureKind, PaymentMethod, PaymentStatus};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

mockall::mock! {
    pub Gateway {}

    #[async_trait::async_trait]
    impl PaymentGateway for Gateway {
        fn kind(&self) -> &str;
        async fn process_payment(
            &self,
            request: &ChargeRequest,
        ) -> Result<GatewayResponse, GatewayError>;
        async fn refund_payment(
            &self,
            request: &RefundRequest,
        ) -> Result<GatewayResponse, GatewayError>;
        async fn payment_status(
            &self,
            transaction_id: &str,
        ) -> Result<PaymentStatus, GatewayError>;
        async fn is_healthy(&self) -> bool;
    }
}

/// Adapter whose health probe takes a configurable time to answer.
struct SlowProbeGateway {
    name: String,
    probe_delay: Duration,
}

#[async_trait::async_trait]
impl PaymentGateway for SlowProbeGateway {
    fn kind(&self) -> &str {
        &self.name
    }

    async fn process_payment(
        &self,
        _request: &ChargeRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        Err(GatewayError::new(FailureKind::InternalError, "probe-only"))
    }

    async fn refund_payment(
        &self,
        _request: &RefundRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        Err(GatewayError::new(FailureKind::InternalError, "probe-only"))
    }

    async fn payment_status(&self, _transaction_id: &str) -> Result<PaymentStatus, GatewayError> {
        Err(GatewayError::new(FailureKind::InternalError, "probe-only"))
    }

    async fn is_healthy(&self) -> bool {
        tokio::time::sleep(self.probe_delay).await;
        true
    }
}

fn simulated(kind: &str) -> Arc<SimulatedGateway> {
    Arc::new(SimulatedGateway::new(SimulatedGatewayConfig {
        kind: kind.to_string(),
        base_latency: Duration::ZERO,
        seed: Some(9),
        ..SimulatedGatewayConfig::default()
    }))
}

#[tokio::test]
async fn test_register_and_lookup() {
    let manager = PaymentGatewayManager::new(Duration::from_secs(5));
    manager.register(simulated("stripe"));
    manager.register(simulated("adyen"));

    assert!(manager.get("stripe").is_some());
    assert!(manager.get("paypal").is_none());
    assert_eq!(
        manager.available_gateways(),
        vec!["adyen".to_string(), "stripe".to_string()]
    );
}

#[tokio::test]
async fn test_register_overwrites_prior_entry() {
    let manager = PaymentGatewayManager::new(Duration::from_secs(5));
    let first = simulated("stripe");
    let second = simulated("stripe");
    manager.register(Arc::clone(&first) as Arc<dyn PaymentGateway>);
    manager.register(Arc::clone(&second) as Arc<dyn PaymentGateway>);

    assert_eq!(manager.available_gateways().len(), 1);

    // Calls route to the most recently registered adapter.
    let charge = ChargeRequest {
        order_id: "o1".to_string(),
        amount: dec!(5.00),
        currency: "USD".to_string(),
        method: PaymentMethod::Card,
    };
    manager
        .get("stripe")
        .unwrap()
        .process_payment(&charge)
        .await
        .unwrap();
    assert_eq!(first.charge_calls(), 0);
    assert_eq!(second.charge_calls(), 1);
}

#[tokio::test]
async fn test_healthy_gateways_filters_unhealthy() {
    let manager = PaymentGatewayManager::new(Duration::from_secs(5));
    let up = simulated("up");
    let down = simulated("down");
    down.set_healthy(false);
    manager.register(up);
    manager.register(down);

    assert_eq!(manager.healthy_gateways().await, vec!["up".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_health_checks_run_concurrently() {
    // Each adapter takes 1s to answer; a sequential scan of four would need
    // 4s and trip the 2s aggregate bound.
    let manager = PaymentGatewayManager::new(Duration::from_secs(2));

    for name in ["a", "b", "c", "d"] {
        manager.register(Arc::new(SlowProbeGateway {
            name: name.to_string(),
            probe_delay: Duration::from_secs(1),
        }));
    }

    let healthy = manager.healthy_gateways().await;
    assert_eq!(healthy.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_health_aggregation_is_bounded() {
    let manager = PaymentGatewayManager::new(Duration::from_millis(100));

    manager.register(Arc::new(SlowProbeGateway {
        name: "slow".to_string(),
        probe_delay: Duration::from_secs(3600),
    }));

    // A gateway that never answers in time is simply not healthy.
    assert!(manager.healthy_gateways().await.is_empty());
}

#[tokio::test]
async fn test_mocked_gateway_failure_classification() {
    let mut mock = MockGateway::new();
    mock.expect_kind().return_const("mocked".to_string());
    mock.expect_process_payment()
        .returning(|_| Err(GatewayError::new(FailureKind::RateLimited, "slow down")));

    let manager = PaymentGatewayManager::new(Duration::from_secs(5));
    manager.register(Arc::new(mock));

    let charge = ChargeRequest {
        order_id: "o1".to_string(),
        amount: dec!(5.00),
        currency: "USD".to_string(),
        method: PaymentMethod::Card,
    };
    let err = manager
        .get("mocked")
        .unwrap()
        .process_payment(&charge)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::RateLimited);
}

#[tokio::test]
async fn test_mocked_health_check() {
    let mut mock = MockGateway::new();
    mock.expect_kind().return_const("mocked".to_string());
    mock.expect_is_healthy().times(1).returning(|| false);

    let manager = PaymentGatewayManager::new(Duration::from_secs(5));
    manager.register(Arc::new(mock));

    assert!(manager.healthy_gateways().await.is_empty());
}
