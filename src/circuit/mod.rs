pub mod breaker;
pub mod manager;

pub use breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitError, CircuitState,
};
pub use manager::CircuitBreakerManager;
