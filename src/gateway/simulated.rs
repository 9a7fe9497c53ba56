use crate::gateway::{ChargeRequest, GatewayError, GatewayResponse, PaymentGateway, RefundRequest};
use crate::models::{FailureKind, PaymentStatus};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Configuration for the fault-injecting test double.
#[derive(Debug, Clone)]
pub struct SimulatedGatewayConfig {
    pub kind: String,
    /// Simulated processor latency per call.
    pub base_latency: Duration,
    /// Probability in [0, 1] that a charge fails.
    pub failure_rate: f64,
    /// Weighted failure taxonomy used when a charge fails.
    pub failure_weights: Vec<(FailureKind, u32)>,
    /// Fixed seed makes the outcome sequence reproducible.
    pub seed: Option<u64>,
}

impl Default for SimulatedGatewayConfig {
    fn default() -> Self {
        Self {
            kind: "simulated".to_string(),
            base_latency: Duration::from_millis(50),
            failure_rate: 0.0,
            failure_weights: vec![
                (FailureKind::NetworkError, 25),
                (FailureKind::GatewayTimeout, 20),
                (FailureKind::RateLimited, 15),
                (FailureKind::InsufficientFunds, 15),
                (FailureKind::InvalidCard, 8),
                (FailureKind::ExpiredCard, 7),
                (FailureKind::FraudSuspected, 4),
                (FailureKind::CardBlocked, 3),
                (FailureKind::InternalError, 3),
            ],
            seed: None,
        }
    }
}

/// In-process stand-in for an external processor.
///
/// Charges fail with the configured probability; the failure classification
/// is picked by walking the cumulative weight table with the same uniform
/// draw that decided the failure, so a fixed seed replays the exact outcome
/// sequence. Tests can also enqueue scripted outcomes that take precedence
/// over the random model.
pub struct SimulatedGateway {
    config: SimulatedGatewayConfig,
    rng: Mutex<StdRng>,
    script: Mutex<VecDeque<Option<FailureKind>>>,
    transactions: RwLock<HashMap<String, PaymentStatus>>,
    calls: AtomicU64,
    healthy: AtomicBool,
}

impl SimulatedGateway {
    pub fn new(config: SimulatedGatewayConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
            script: Mutex::new(VecDeque::new()),
            transactions: RwLock::new(HashMap::new()),
            calls: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn with_kind(kind: impl Into<String>) -> Self {
        Self::new(SimulatedGatewayConfig {
            kind: kind.into(),
            ..SimulatedGatewayConfig::default()
        })
    }

    /// Enqueues outcomes consumed one per charge; `None` means success.
    /// Once the script is drained the random model takes over again.
    pub fn script_outcomes(&self, outcomes: impl IntoIterator<Item = Option<FailureKind>>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of charge calls that reached this gateway.
    pub fn charge_calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn draw_outcome(&self) -> Option<FailureKind> {
        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }
        if self.config.failure_rate <= 0.0 {
            return None;
        }
        let draw: f64 = self.rng.lock().unwrap().gen_range(0.0..1.0);
        if draw >= self.config.failure_rate {
            return None;
        }

        // Reuse the failing draw: rescaled into [0, 1) it selects the
        // classification from the cumulative weight table.
        let total: u32 = self.config.failure_weights.iter().map(|(_, w)| w).sum();
        if total == 0 {
            return Some(FailureKind::InternalError);
        }
        let target = ((draw / self.config.failure_rate) * total as f64) as u32;
        let mut cumulative = 0u32;
        for (kind, weight) in &self.config.failure_weights {
            cumulative += weight;
            if target < cumulative {
                return Some(*kind);
            }
        }
        Some(FailureKind::InternalError)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for SimulatedGateway {
    fn kind(&self) -> &str {
        &self.config.kind
    }

    async fn process_payment(
        &self,
        request: &ChargeRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.draw_outcome();

        // Cancellable: a caller timeout aborts the call mid-latency.
        tokio::time::sleep(self.config.base_latency).await;

        match outcome {
            Some(kind) => {
                tracing::debug!(
                    gateway = %self.config.kind,
                    order_id = %request.order_id,
                    failure = %kind,
                    "simulated charge failed"
                );
                Err(GatewayError::new(
                    kind,
                    format!("simulated {} failure", kind),
                ))
            }
            None => {
                let transaction_id = format!("sim_{}", Uuid::new_v4());
                self.transactions
                    .write()
                    .unwrap()
                    .insert(transaction_id.clone(), PaymentStatus::Completed);
                Ok(GatewayResponse {
                    transaction_id,
                    gateway: self.config.kind.clone(),
                    processed_at: Utc::now(),
                })
            }
        }
    }

    async fn refund_payment(
        &self,
        request: &RefundRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        tokio::time::sleep(self.config.base_latency).await;

        let known = self
            .transactions
            .read()
            .unwrap()
            .contains_key(&request.transaction_id);
        if !known {
            return Err(GatewayError::new(
                FailureKind::InternalError,
                format!("unknown transaction '{}'", request.transaction_id),
            ));
        }

        Ok(GatewayResponse {
            transaction_id: format!("sim_refund_{}", Uuid::new_v4()),
            gateway: self.config.kind.clone(),
            processed_at: Utc::now(),
        })
    }

    async fn payment_status(&self, transaction_id: &str) -> Result<PaymentStatus, GatewayError> {
        tokio::time::sleep(self.config.base_latency).await;

        self.transactions
            .read()
            .unwrap()
            .get(transaction_id)
            .copied()
            .ok_or_else(|| {
                GatewayError::new(
                    FailureKind::InternalError,
                    format!("unknown transaction '{transaction_id}'"),
                )
            })
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
