use crate::gateway::PaymentGateway;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Registry mapping a gateway tag to its adapter.
///
/// Constructed once at startup and shared behind an `Arc`; registration is
/// expected at wiring time but remains safe under concurrent traffic.
pub struct PaymentGatewayManager {
    gateways: RwLock<HashMap<String, Arc<dyn PaymentGateway>>>,
    health_check_timeout: Duration,
}

impl PaymentGatewayManager {
    pub fn new(health_check_timeout: Duration) -> Self {
        Self {
            gateways: RwLock::new(HashMap::new()),
            health_check_timeout,
        }
    }

    /// Registers an adapter under its tag, replacing any prior entry.
    pub fn register(&self, gateway: Arc<dyn PaymentGateway>) {
        let kind = gateway.kind().to_string();
        let mut gateways = self.gateways.write().unwrap();
        if gateways.insert(kind.clone(), gateway).is_some() {
            tracing::warn!(gateway = %kind, "replaced previously registered gateway");
        } else {
            tracing::info!(gateway = %kind, "registered gateway");
        }
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.read().unwrap().get(kind).cloned()
    }

    /// Tags of all registered gateways.
    pub fn available_gateways(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.gateways.read().unwrap().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Tags of gateways currently reporting healthy.
    ///
    /// Checks run concurrently, one task per gateway, and the aggregate is
    /// bounded by the configured health-check timeout; gateways that fail to
    /// answer in time are treated as unhealthy.
    pub async fn healthy_gateways(&self) -> Vec<String> {
        let gateways: Vec<(String, Arc<dyn PaymentGateway>)> = {
            let guard = self.gateways.read().unwrap();
            guard
                .iter()
                .map(|(kind, gw)| (kind.clone(), Arc::clone(gw)))
                .collect()
        };

        let handles: Vec<_> = gateways
            .into_iter()
            .map(|(kind, gateway)| {
                tokio::spawn(async move {
                    let healthy = gateway.is_healthy().await;
                    (kind, healthy)
                })
            })
            .collect();

        let aggregated = tokio::time::timeout(self.health_check_timeout, async {
            let mut healthy = Vec::new();
            for handle in handles {
                if let Ok((kind, is_healthy)) = handle.await {
                    if is_healthy {
                        healthy.push(kind);
                    }
                }
            }
            healthy
        })
        .await;

        let mut healthy = match aggregated {
            Ok(kinds) => kinds,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.health_check_timeout.as_millis() as u64,
                    "gateway health aggregation timed out"
                );
                Vec::new()
            }
        };
        healthy.sort();
        healthy
    }
}
