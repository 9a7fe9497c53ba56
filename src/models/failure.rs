use serde::{Deserialize, Serialize};

/// Classification of a failed gateway interaction.
///
/// The set is closed: every outcome an adapter can report maps onto exactly
/// one of these kinds, and retry decisions are driven by the classification
/// rather than by error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Network-level failure reaching the processor.
    NetworkError,
    /// The processor did not answer within the attempt deadline.
    GatewayTimeout,
    /// The processor answered with a transient server-side error.
    GatewayError,
    /// The processor throttled the request.
    RateLimited,
    /// Soft decline the processor suggests retrying.
    TemporaryDecline,
    /// The account cannot cover the amount.
    InsufficientFunds,
    /// Card number failed validation at the processor.
    InvalidCard,
    /// Card is past its expiry date.
    ExpiredCard,
    /// The processor's risk engine rejected the payment.
    FraudSuspected,
    /// Card is blocked by the issuer.
    CardBlocked,
    /// Amount rejected by the processor.
    InvalidAmount,
    /// Currency not supported for this route.
    InvalidCurrency,
    /// Adapter or route misconfiguration.
    ConfigurationError,
    /// Credentials rejected by the processor.
    AuthenticationError,
    /// Unclassified processor-side error.
    InternalError,
    /// Synthetic: the circuit breaker refused the call without contacting
    /// the processor. Never counted against the breaker's own tally.
    CircuitOpen,
    /// The caller's deadline expired or the submission was cancelled.
    Cancelled,
}

impl FailureKind {
    /// Default retriable/terminal split. `CircuitOpen` is handled separately
    /// by the orchestrator (retriable later, but not a gateway failure).
    pub fn is_retriable(&self) -> bool {
        match self {
            FailureKind::NetworkError
            | FailureKind::GatewayTimeout
            | FailureKind::GatewayError
            | FailureKind::RateLimited
            | FailureKind::TemporaryDecline => true,
            FailureKind::InsufficientFunds
            | FailureKind::InvalidCard
            | FailureKind::ExpiredCard
            | FailureKind::FraudSuspected
            | FailureKind::CardBlocked
            | FailureKind::InvalidAmount
            | FailureKind::InvalidCurrency
            | FailureKind::ConfigurationError
            | FailureKind::AuthenticationError
            | FailureKind::InternalError
            | FailureKind::CircuitOpen
            | FailureKind::Cancelled => false,
        }
    }

    /// Stable snake_case label used for metrics and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NetworkError => "network_error",
            FailureKind::GatewayTimeout => "gateway_timeout",
            FailureKind::GatewayError => "gateway_error",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::TemporaryDecline => "temporary_decline",
            FailureKind::InsufficientFunds => "insufficient_funds",
            FailureKind::InvalidCard => "invalid_card",
            FailureKind::ExpiredCard => "expired_card",
            FailureKind::FraudSuspected => "fraud_suspected",
            FailureKind::CardBlocked => "card_blocked",
            FailureKind::InvalidAmount => "invalid_amount",
            FailureKind::InvalidCurrency => "invalid_currency",
            FailureKind::ConfigurationError => "configuration_error",
            FailureKind::AuthenticationError => "authentication_error",
            FailureKind::InternalError => "internal_error",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
