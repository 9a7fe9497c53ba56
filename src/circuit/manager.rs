use crate::circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Holds exactly one breaker per gateway tag, created lazily on first use.
pub struct CircuitBreakerManager {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the breaker for `gateway`, creating it on first reference.
    ///
    /// Double-checked: the fast path is a read lock; construction re-checks
    /// under the write lock so concurrent first references share one breaker.
    pub fn get_or_create(&self, gateway: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().unwrap().get(gateway) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().unwrap();
        if let Some(breaker) = breakers.get(gateway) {
            return Arc::clone(breaker);
        }

        tracing::debug!(gateway = %gateway, "creating circuit breaker");
        let breaker = Arc::new(CircuitBreaker::new(gateway, self.config.clone()));
        breakers.insert(gateway.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Snapshot of every breaker, for the admin surface.
    pub fn snapshot_all(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut snapshots: Vec<CircuitBreakerSnapshot> = self
            .breakers
            .read()
            .unwrap()
            .values()
            .map(|b| b.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.gateway.cmp(&b.gateway));
        snapshots
    }

    /// Resets one breaker back to Closed. Returns false if it never existed.
    pub fn reset(&self, gateway: &str) -> bool {
        match self.breakers.read().unwrap().get(gateway) {
            Some(breaker) => {
                breaker.reset();
                tracing::info!(gateway = %gateway, "circuit breaker reset");
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.read().unwrap().values() {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default());
        let a = manager.get_or_create("stripe");
        let b = manager.get_or_create("stripe");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.snapshot_all().len(), 1);
    }

    #[test]
    fn test_reset_unknown_gateway() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default());
        assert!(!manager.reset("unknown"));
        manager.get_or_create("known");
        assert!(manager.reset("known"));
    }
}
