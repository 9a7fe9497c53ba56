pub mod manager;
pub mod simulated;

pub use manager::PaymentGatewayManager;
pub use simulated::{SimulatedGateway, SimulatedGatewayConfig};

use crate::models::{FailureKind, PaymentMethod, PaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed gateway interaction, classified for retry decisions.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: FailureKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Charge instruction handed to an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
}

/// Refund instruction handed to an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Normalized processor response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub transaction_id: String,
    pub gateway: String,
    pub processed_at: DateTime<Utc>,
}

/// Capability interface for an external payment processor.
///
/// Deadlines are the caller's concern: adapters await I/O (or simulated
/// latency) on cancellable futures, and the orchestrator wraps each call in
/// `tokio::time::timeout`, so dropping the future aborts the interaction
/// promptly, including mid-latency in the simulated adapter.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registry tag for this processor.
    fn kind(&self) -> &str;

    async fn process_payment(&self, request: &ChargeRequest)
        -> Result<GatewayResponse, GatewayError>;

    async fn refund_payment(&self, request: &RefundRequest)
        -> Result<GatewayResponse, GatewayError>;

    async fn payment_status(&self, transaction_id: &str)
        -> Result<PaymentStatus, GatewayError>;

    async fn is_healthy(&self) -> bool;
}
