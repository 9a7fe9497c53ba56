use crate::gateway::PaymentGatewayManager;
use crate::observability::LatencyTimer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Health status of the engine or one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Health of a single gateway dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<f64>,
    pub message: Option<String>,
}

impl DependencyHealth {
    pub fn healthy(name: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message.into()),
        }
    }
}

/// Aggregated health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedHealth {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: Vec<DependencyHealth>,
}

impl AggregatedHealth {
    fn aggregate_status(dependencies: &[DependencyHealth]) -> HealthStatus {
        if dependencies.is_empty() {
            return HealthStatus::Unhealthy;
        }
        let unhealthy = dependencies
            .iter()
            .filter(|d| !d.status.is_healthy())
            .count();
        if unhealthy == 0 {
            HealthStatus::Healthy
        } else if unhealthy < dependencies.len() {
            // At least one route is still up.
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Probes every registered gateway and aggregates the result.
pub struct HealthChecker {
    gateways: Arc<PaymentGatewayManager>,
    started_at: Instant,
    version: String,
}

impl HealthChecker {
    pub fn new(gateways: Arc<PaymentGatewayManager>) -> Self {
        Self {
            gateways,
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub async fn check(&self) -> AggregatedHealth {
        let timer = LatencyTimer::start();
        let healthy = self.gateways.healthy_gateways().await;
        let latency_ms = timer.elapsed_ms();

        let dependencies: Vec<DependencyHealth> = self
            .gateways
            .available_gateways()
            .into_iter()
            .map(|kind| {
                if healthy.contains(&kind) {
                    DependencyHealth::healthy(kind, latency_ms)
                } else {
                    DependencyHealth::unhealthy(kind, "health check failed or timed out")
                }
            })
            .collect();

        AggregatedHealth {
            status: AggregatedHealth::aggregate_status(&dependencies),
            version: self.version.clone(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            dependencies,
        }
    }
}
