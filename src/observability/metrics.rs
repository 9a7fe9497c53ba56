use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the payment engine.
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_payment_attempt(&self, gateway: &str, outcome: &str) {
        counter!("payment_attempts_total", "gateway" => gateway.to_string(), "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_payment_completed(&self, gateway: &str) {
        counter!("payment_completed_total", "gateway" => gateway.to_string()).increment(1);
    }

    pub fn record_payment_failed(&self, reason: &str) {
        counter!("payment_failed_total", "reason" => reason.to_string()).increment(1);
    }

    pub fn record_payment_duration(&self, duration_ms: f64) {
        histogram!("payment_processing_duration_ms").record(duration_ms);
    }

    pub fn record_gateway_call_latency(&self, gateway: &str, duration_ms: f64) {
        histogram!("payment_gateway_call_duration_ms", "gateway" => gateway.to_string()).record(duration_ms);
    }

    pub fn record_circuit_transition(&self, gateway: &str, from: &str, to: &str) {
        counter!("payment_circuit_transitions_total", "gateway" => gateway.to_string(), "from" => from.to_string(), "to" => to.to_string()).increment(1);
    }

    pub fn record_circuit_rejection(&self, gateway: &str) {
        counter!("payment_circuit_rejections_total", "gateway" => gateway.to_string()).increment(1);
    }

    pub fn record_idempotency_hit(&self) {
        counter!("payment_idempotency_hits_total").increment(1);
    }

    pub fn record_idempotency_conflict(&self) {
        counter!("payment_idempotency_conflicts_total").increment(1);
    }

    pub fn record_idempotency_sweep(&self, removed: usize) {
        counter!("payment_idempotency_swept_total").increment(removed as u64);
    }

    pub fn record_retry_scheduled(&self, gateway: &str, delay_ms: f64) {
        counter!("payment_retries_total", "gateway" => gateway.to_string()).increment(1);
        histogram!("payment_retry_delay_ms").record(delay_ms);
    }
}

/// Installs the Prometheus recorder and registers metric descriptions.
/// Returns the handle the embedding service scrapes from.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if METRICS_HANDLE.get().is_none() {
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_counter!("payment_attempts_total", "Gateway attempts by outcome");
        describe_counter!("payment_completed_total", "Payments completed successfully");
        describe_counter!("payment_failed_total", "Payments terminally failed, by reason");
        describe_counter!(
            "payment_circuit_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_counter!(
            "payment_circuit_rejections_total",
            "Calls rejected by an open circuit"
        );
        describe_counter!("payment_idempotency_hits_total", "Idempotency cache hits");
        describe_counter!(
            "payment_idempotency_conflicts_total",
            "Idempotency key reuse conflicts"
        );
        describe_counter!(
            "payment_idempotency_swept_total",
            "Expired idempotency records removed by sweeps"
        );
        describe_counter!("payment_retries_total", "Retry attempts scheduled");
        describe_histogram!(
            "payment_processing_duration_ms",
            Unit::Milliseconds,
            "End-to-end payment processing time"
        );
        describe_histogram!(
            "payment_gateway_call_duration_ms",
            Unit::Milliseconds,
            "Single gateway call latency"
        );
        describe_histogram!(
            "payment_retry_delay_ms",
            Unit::Milliseconds,
            "Backoff delay before a retry"
        );

        let _ = METRICS_HANDLE.set(handle);
        tracing::info!("Prometheus metrics recorder installed");
    }

    METRICS_HANDLE
        .get()
        .ok_or_else(|| anyhow::anyhow!("metrics recorder not installed"))
}

/// Returns the global metrics instance, initializing it if needed. Recording
/// without an installed exporter is a no-op, which keeps tests quiet.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Measures elapsed time from construction, in milliseconds.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::start()
    }
}
