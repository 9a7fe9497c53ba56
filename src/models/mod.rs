pub mod failure;
pub mod payment;

pub use failure::FailureKind;
pub use payment::{
    PaymentAttempt, PaymentMethod, PaymentRequest, PaymentResult, PaymentStatus, ValidationError,
};
