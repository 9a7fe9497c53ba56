use crate::models::FailureKind;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Payment instrument category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

/// Status of a payment in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Accepted but no attempt has started yet.
    Pending,
    /// An attempt is currently in flight.
    Processing,
    /// A retriable attempt failed and another attempt is scheduled.
    Retrying,
    /// A gateway attempt succeeded.
    Completed,
    /// All attempts are exhausted or a terminal failure occurred.
    Failed,
}

impl PaymentStatus {
    /// Returns true if the payment is in a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Retrying => "retrying",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// A payment submission.
///
/// The idempotency key scopes "same logical request" across client retries:
/// two submissions with the same key and the same payload are one payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub idempotency_key: String,
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    /// Preferred gateway tag. Falls back to the configured default when absent.
    pub gateway: Option<String>,
    /// Per-request retry policy override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    /// Per-attempt timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_duration_ms")]
    pub attempt_timeout: Option<Duration>,
    /// Free-form caller context, passed through untouched.
    pub metadata: Option<serde_json::Value>,
}

mod optional_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms: Option<u64> = Option::deserialize(d)?;
        Ok(ms.map(Duration::from_millis))
    }
}

impl PaymentRequest {
    pub fn new(
        idempotency_key: impl Into<String>,
        order_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        method: PaymentMethod,
    ) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            order_id: order_id.into(),
            amount,
            currency: currency.into(),
            method,
            gateway: None,
            retry_policy: None,
            attempt_timeout: None,
            metadata: None,
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.idempotency_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "idempotency_key".to_string(),
                message: "idempotency_key cannot be empty".to_string(),
            });
        }
        if self.order_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "order_id".to_string(),
                message: "order_id cannot be empty".to_string(),
            });
        }
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError {
                field: "amount".to_string(),
                message: "amount must be greater than zero".to_string(),
            });
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(ValidationError {
                field: "currency".to_string(),
                message: "currency must be a 3-letter ISO 4217 code".to_string(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// One gateway interaction within a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// 1-based, strictly increasing within one payment.
    pub attempt_number: u32,
    pub gateway: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    pub failure: Option<FailureKind>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

/// Finalized (or in-progress) outcome of a payment submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub payment_id: Uuid,
    pub idempotency_key: String,
    pub status: PaymentStatus,
    pub success: bool,
    /// Processor-side reference of the successful charge, used for refunds
    /// and status lookups.
    pub transaction_id: Option<String>,
    pub attempts: Vec<PaymentAttempt>,
    pub failure: Option<FailureKind>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentResult {
    pub fn new(idempotency_key: impl Into<String>) -> Self {
        Self {
            payment_id: Uuid::new_v4(),
            idempotency_key: idempotency_key.into(),
            status: PaymentStatus::Pending,
            success: false,
            transaction_id: None,
            attempts: Vec::new(),
            failure: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Appends an attempt, assigning the next ordinal.
    pub fn record_attempt(
        &mut self,
        gateway: &str,
        started_at: DateTime<Utc>,
        outcome: Result<(), (FailureKind, String)>,
    ) {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        let attempt = match outcome {
            Ok(()) => PaymentAttempt {
                attempt_number: self.attempts.len() as u32 + 1,
                gateway: gateway.to_string(),
                started_at,
                completed_at,
                success: true,
                failure: None,
                error_message: None,
                duration_ms,
            },
            Err((kind, message)) => PaymentAttempt {
                attempt_number: self.attempts.len() as u32 + 1,
                gateway: gateway.to_string(),
                started_at,
                completed_at,
                success: false,
                failure: Some(kind),
                error_message: Some(message),
                duration_ms,
            },
        };
        self.attempts.push(attempt);
    }

    /// Marks the payment as successfully completed.
    pub fn complete(&mut self) {
        self.status = PaymentStatus::Completed;
        self.success = true;
        self.failure = None;
        self.error_message = None;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the payment as terminally failed.
    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.status = PaymentStatus::Failed;
        self.success = false;
        self.failure = Some(kind);
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}
