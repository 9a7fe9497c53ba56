pub mod payment_service;
pub mod single_flight;

pub use payment_service::{PaymentService, PaymentServiceConfig};
pub use single_flight::KeyedLock;
