use crate::error::{AppError, Result};
use crate::models::{PaymentRequest, PaymentResult, PaymentStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Configuration for the idempotency cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    pub ttl_seconds: i64,
    pub cleanup_interval_seconds: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86_400, // 24 hours
            cleanup_interval_seconds: 3_600,
        }
    }
}

/// Cached outcome of a payment keyed by its idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    pub payment_id: Uuid,
    pub request_hash: String,
    pub status: PaymentStatus,
    pub result: PaymentResult,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Result of an idempotency check. A key reused with a different payload is
/// surfaced as an error, never as a variant here.
#[derive(Debug)]
pub enum IdempotencyCheckResult {
    /// Unknown (or expired) key; proceed with processing.
    Miss,
    /// Key seen before with the same payload; return the cached result.
    Hit(PaymentResult),
}

/// Counters for idempotency handling.
#[derive(Debug, Default)]
pub struct IdempotencyMetrics {
    pub checks: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub conflicts: AtomicU64,
    pub expired_purged: AtomicU64,
}

impl IdempotencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IdempotencyMetricsSnapshot {
        IdempotencyMetricsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            expired_purged: self.expired_purged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyMetricsSnapshot {
    pub checks: u64,
    pub hits: u64,
    pub misses: u64,
    pub conflicts: u64,
    pub expired_purged: u64,
}

impl IdempotencyMetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        if self.checks == 0 {
            0.0
        } else {
            self.hits as f64 / self.checks as f64
        }
    }
}

/// Cache population counts reported on the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

/// In-memory idempotency cache.
///
/// Records decisions only: serializing concurrent submissions that share a
/// key (so a single gateway call occurs) is the orchestrator's job.
pub struct IdempotencyManager {
    records: RwLock<HashMap<String, IdempotencyRecord>>,
    config: IdempotencyConfig,
    metrics: Arc<IdempotencyMetrics>,
}

impl IdempotencyManager {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
            metrics: Arc::new(IdempotencyMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<IdempotencyMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Deterministic hash of the request payload, hex-encoded SHA-256 over
    /// the canonical tuple. Amount is rescaled to two decimals first so
    /// `10`, `10.0` and `10.00` hash identically.
    pub fn request_hash(&self, request: &PaymentRequest) -> String {
        let mut amount = request.amount;
        amount.rescale(2);

        let mut hasher = Sha256::new();
        hasher.update(b"order:");
        hasher.update(request.order_id.as_bytes());
        hasher.update(b"|amount:");
        hasher.update(amount.to_string().as_bytes());
        hasher.update(b"|currency:");
        hasher.update(request.currency.as_bytes());
        hasher.update(b"|method:");
        hasher.update(request.method.as_str().as_bytes());
        hasher.update(b"|gateway:");
        hasher.update(request.gateway.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|key:");
        hasher.update(request.idempotency_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Looks up the request's key.
    ///
    /// Expired records are purged on sight and count as a miss. A present
    /// record whose stored hash differs from the incoming request's hash is
    /// an idempotency conflict, never a miss: treating it as a miss would
    /// risk a duplicate charge.
    pub fn check(&self, request: &PaymentRequest) -> Result<IdempotencyCheckResult> {
        self.check_at(request, Utc::now())
    }

    pub fn check_at(
        &self,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<IdempotencyCheckResult> {
        self.metrics.checks.fetch_add(1, Ordering::Relaxed);
        let hash = self.request_hash(request);
        let key = &request.idempotency_key;

        let mut records = self.records.write().unwrap();
        let expired = matches!(records.get(key), Some(record) if record.is_expired_at(now));
        if expired {
            records.remove(key);
            self.metrics.misses.fetch_add(1, Ordering::Relaxed);
            self.metrics.expired_purged.fetch_add(1, Ordering::Relaxed);
            return Ok(IdempotencyCheckResult::Miss);
        }

        match records.get_mut(key) {
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                Ok(IdempotencyCheckResult::Miss)
            }
            Some(record) => {
                if record.request_hash != hash {
                    self.metrics.conflicts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, "idempotency key reused with different parameters");
                    return Err(AppError::IdempotencyConflict {
                        key: key.clone(),
                        message: "idempotency key reused with different request parameters"
                            .to_string(),
                    });
                }
                record.last_accessed_at = now;
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Ok(IdempotencyCheckResult::Hit(record.result.clone()))
            }
        }
    }

    /// Inserts a record for a key entering processing.
    pub fn store(&self, request: &PaymentRequest, result: &PaymentResult) {
        self.store_at(request, result, Utc::now());
    }

    pub fn store_at(&self, request: &PaymentRequest, result: &PaymentResult, now: DateTime<Utc>) {
        let record = IdempotencyRecord {
            idempotency_key: request.idempotency_key.clone(),
            payment_id: result.payment_id,
            request_hash: self.request_hash(request),
            status: result.status,
            result: result.clone(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + Duration::seconds(self.config.ttl_seconds),
        };
        self.records
            .write()
            .unwrap()
            .insert(record.idempotency_key.clone(), record);
    }

    /// Updates an existing record with the latest result.
    ///
    /// An absent key is a bug in the caller; it is logged and ignored rather
    /// than masked by creating a record with no known request hash.
    pub fn update(&self, key: &str, result: &PaymentResult) {
        let mut records = self.records.write().unwrap();
        match records.get_mut(key) {
            Some(record) => {
                record.status = result.status;
                record.result = result.clone();
                record.last_accessed_at = Utc::now();
            }
            None => {
                tracing::warn!(key = %key, "update for unknown idempotency record ignored");
            }
        }
    }

    /// Removes one record. Returns false if it was not present.
    pub fn remove(&self, key: &str) -> bool {
        self.records.write().unwrap().remove(key).is_some()
    }

    /// Purges expired records; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let removed = before - records.len();
        if removed > 0 {
            self.metrics
                .expired_purged
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::info!(removed, "purged expired idempotency records");
        }
        removed
    }

    pub fn stats(&self) -> IdempotencyStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> IdempotencyStats {
        let records = self.records.read().unwrap();
        let total = records.len();
        let expired = records.values().filter(|r| r.is_expired_at(now)).count();
        IdempotencyStats {
            total,
            active: total - expired,
            expired,
        }
    }
}
