use crate::circuit::{CircuitBreakerManager, CircuitBreakerSnapshot, CircuitError};
use crate::error::{AppError, Result};
use crate::gateway::{
    ChargeRequest, GatewayError, GatewayResponse, PaymentGateway, PaymentGatewayManager,
    RefundRequest,
};
use crate::idempotency::{IdempotencyCheckResult, IdempotencyManager, IdempotencyStats};
use crate::models::{FailureKind, PaymentRequest, PaymentResult, PaymentStatus};
use crate::observability::{get_metrics, mask_sensitive, LatencyTimer};
use crate::repositories::PaymentResultRepository;
use crate::retry::RetryPolicy;
use crate::services::KeyedLock;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Orchestrator-level settings.
#[derive(Debug, Clone)]
pub struct PaymentServiceConfig {
    /// Gateway used when the request carries no selector.
    pub default_gateway: String,
    /// Per-attempt bound on the gateway call.
    pub attempt_timeout: Duration,
}

impl Default for PaymentServiceConfig {
    fn default() -> Self {
        Self {
            default_gateway: "simulated".to_string(),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Composes the idempotency cache, circuit breakers, retry policy and the
/// gateway registry into the at-most-once submission flow.
pub struct PaymentService {
    gateways: Arc<PaymentGatewayManager>,
    breakers: Arc<CircuitBreakerManager>,
    idempotency: Arc<IdempotencyManager>,
    repository: Arc<dyn PaymentResultRepository>,
    default_policy: RetryPolicy,
    config: PaymentServiceConfig,
    submissions: KeyedLock,
}

impl PaymentService {
    pub fn new(
        gateways: Arc<PaymentGatewayManager>,
        breakers: Arc<CircuitBreakerManager>,
        idempotency: Arc<IdempotencyManager>,
        repository: Arc<dyn PaymentResultRepository>,
        default_policy: RetryPolicy,
        config: PaymentServiceConfig,
    ) -> Self {
        Self {
            gateways,
            breakers,
            idempotency,
            repository,
            default_policy,
            config,
            submissions: KeyedLock::new(),
        }
    }

    /// Processes one payment submission to completion.
    ///
    /// Submissions sharing an idempotency key are serialized: of N
    /// simultaneous callers with the same key and payload, one drives the
    /// gateway and the rest observe its cached result. A finalized result is
    /// returned as `Ok` even when the payment failed; `Err` is reserved for
    /// rejections (validation, conflict, unknown gateway) and internal
    /// faults.
    pub async fn process_payment(&self, request: PaymentRequest) -> Result<PaymentResult> {
        request.validate().map_err(|errors| {
            let detail = errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            AppError::Validation(detail)
        })?;

        let key = request.idempotency_key.clone();
        let _guard = self.submissions.acquire(&key).await;

        match self.idempotency.check(&request) {
            Ok(IdempotencyCheckResult::Hit(result)) => {
                get_metrics().record_idempotency_hit();
                tracing::info!(
                    key = %mask_sensitive(&key, 4),
                    payment_id = %result.payment_id,
                    "returning cached payment result"
                );
                return Ok(result);
            }
            Ok(IdempotencyCheckResult::Miss) => {}
            Err(err) => {
                if err.is_conflict() {
                    get_metrics().record_idempotency_conflict();
                }
                return Err(err);
            }
        }

        let gateway_kind = request
            .gateway
            .clone()
            .unwrap_or_else(|| self.config.default_gateway.clone());
        let gateway = self
            .gateways
            .get(&gateway_kind)
            .ok_or_else(|| AppError::GatewayNotFound(gateway_kind.clone()))?;

        let timer = LatencyTimer::start();
        let mut result = PaymentResult::new(&key);
        result.status = PaymentStatus::Processing;
        self.idempotency.store(&request, &result);

        self.run_attempt_loop(&request, &gateway_kind, gateway, &mut result)
            .await;

        self.idempotency.update(&key, &result);
        self.repository.save(&result).await?;

        let metrics = get_metrics();
        metrics.record_payment_duration(timer.elapsed_ms());
        match result.failure {
            None => metrics.record_payment_completed(&gateway_kind),
            Some(kind) => metrics.record_payment_failed(kind.as_str()),
        }

        tracing::info!(
            payment_id = %result.payment_id,
            key = %mask_sensitive(&key, 4),
            gateway = %gateway_kind,
            status = result.status.as_str(),
            attempts = result.attempt_count(),
            "payment finalized"
        );
        Ok(result)
    }

    /// [`process_payment`](Self::process_payment) bounded by an overall
    /// caller deadline. On expiry the in-flight gateway call and any pending
    /// backoff sleep are aborted with the dropped future.
    pub async fn process_payment_with_deadline(
        &self,
        request: PaymentRequest,
        deadline: Duration,
    ) -> Result<PaymentResult> {
        match tokio::time::timeout(deadline, self.process_payment(request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(deadline)),
        }
    }

    async fn run_attempt_loop(
        &self,
        request: &PaymentRequest,
        gateway_kind: &str,
        gateway: Arc<dyn PaymentGateway>,
        result: &mut PaymentResult,
    ) {
        let policy = request
            .retry_policy
            .clone()
            .unwrap_or_else(|| self.default_policy.clone());
        let attempt_timeout = request.attempt_timeout.unwrap_or(self.config.attempt_timeout);
        let breaker = self.breakers.get_or_create(gateway_kind);
        let charge = ChargeRequest {
            order_id: request.order_id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            method: request.method,
        };

        loop {
            let started_at = Utc::now();
            let outcome = breaker
                .execute(|| async {
                    match tokio::time::timeout(attempt_timeout, gateway.process_payment(&charge))
                        .await
                    {
                        Ok(response) => response,
                        Err(_) => Err(GatewayError::new(
                            FailureKind::GatewayTimeout,
                            format!("gateway call exceeded {}ms", attempt_timeout.as_millis()),
                        )),
                    }
                })
                .await;

            let (kind, message) = match outcome {
                Ok(response) => {
                    result.record_attempt(gateway_kind, started_at, Ok(()));
                    result.transaction_id = Some(response.transaction_id);
                    result.complete();
                    get_metrics().record_payment_attempt(gateway_kind, "success");
                    return;
                }
                Err(CircuitError::Open(_)) => (
                    FailureKind::CircuitOpen,
                    format!("circuit breaker for '{gateway_kind}' is open"),
                ),
                Err(CircuitError::Operation(err)) => (err.kind, err.message),
            };

            result.record_attempt(gateway_kind, started_at, Err((kind, message.clone())));
            get_metrics().record_payment_attempt(gateway_kind, kind.as_str());
            tracing::warn!(
                payment_id = %result.payment_id,
                gateway = %gateway_kind,
                attempt = result.attempt_count(),
                failure = %kind,
                "payment attempt failed"
            );

            // An open circuit is always worth retrying later; everything else
            // consults the policy. Terminal classifications never burn the
            // remaining attempt budget.
            let retriable = kind == FailureKind::CircuitOpen || policy.is_retriable(kind);
            if !retriable {
                result.fail(kind, message);
                return;
            }

            let delay = policy.next_delay(result.attempt_count());
            if delay.is_zero() {
                result.fail(kind, message);
                return;
            }

            result.status = PaymentStatus::Retrying;
            self.idempotency.update(&request.idempotency_key, result);
            get_metrics().record_retry_scheduled(gateway_kind, delay.as_secs_f64() * 1000.0);
            tokio::time::sleep(delay).await;
        }
    }

    /// Refunds a previously completed charge. Single-shot: refunds are
    /// issued by operators and go through the breaker without a retry loop.
    pub async fn refund_payment(
        &self,
        gateway_kind: Option<&str>,
        refund: RefundRequest,
    ) -> Result<GatewayResponse> {
        let kind = gateway_kind.unwrap_or(&self.config.default_gateway);
        let gateway = self
            .gateways
            .get(kind)
            .ok_or_else(|| AppError::GatewayNotFound(kind.to_string()))?;
        let breaker = self.breakers.get_or_create(kind);
        let attempt_timeout = self.config.attempt_timeout;

        breaker
            .execute(|| async {
                match tokio::time::timeout(attempt_timeout, gateway.refund_payment(&refund)).await {
                    Ok(response) => response,
                    Err(_) => Err(GatewayError::new(
                        FailureKind::GatewayTimeout,
                        format!("gateway call exceeded {}ms", attempt_timeout.as_millis()),
                    )),
                }
            })
            .await
            .map_err(|err| match err {
                CircuitError::Open(name) => AppError::CircuitOpen(name),
                CircuitError::Operation(e) => AppError::PaymentFailed {
                    kind: e.kind,
                    message: e.message,
                },
            })
    }

    /// Looks up the processor-side status of a transaction.
    pub async fn payment_status(
        &self,
        gateway_kind: Option<&str>,
        transaction_id: &str,
    ) -> Result<PaymentStatus> {
        let kind = gateway_kind.unwrap_or(&self.config.default_gateway);
        let gateway = self
            .gateways
            .get(kind)
            .ok_or_else(|| AppError::GatewayNotFound(kind.to_string()))?;

        gateway
            .payment_status(transaction_id)
            .await
            .map_err(|e| AppError::PaymentFailed {
                kind: e.kind,
                message: e.message,
            })
    }

    // Admin surface, safe under concurrent traffic.

    pub fn available_gateways(&self) -> Vec<String> {
        self.gateways.available_gateways()
    }

    pub async fn healthy_gateways(&self) -> Vec<String> {
        self.gateways.healthy_gateways().await
    }

    pub fn circuit_stats(&self) -> Vec<CircuitBreakerSnapshot> {
        self.breakers.snapshot_all()
    }

    pub fn reset_circuit(&self, gateway: &str) -> bool {
        self.breakers.reset(gateway)
    }

    pub fn idempotency_stats(&self) -> IdempotencyStats {
        self.idempotency.stats()
    }

    pub fn remove_idempotency_record(&self, key: &str) -> bool {
        self.idempotency.remove(key)
    }

    /// On-demand sweep of expired idempotency records.
    pub fn force_cleanup(&self) -> usize {
        self.idempotency.cleanup_expired()
    }
}
