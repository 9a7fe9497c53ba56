use crate::error::Result;
use crate::models::PaymentResult;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Persistence seam for finalized payment results.
///
/// The engine only writes through this trait; durable storage (and whatever
/// database backs it) belongs to the embedding service.
#[async_trait::async_trait]
pub trait PaymentResultRepository: Send + Sync {
    async fn save(&self, result: &PaymentResult) -> Result<()>;

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentResult>>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<PaymentResult>>;
}

/// Map-backed repository used in tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    results: RwLock<HashMap<Uuid, PaymentResult>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().unwrap().is_empty()
    }
}

#[async_trait::async_trait]
impl PaymentResultRepository for InMemoryPaymentRepository {
    async fn save(&self, result: &PaymentResult) -> Result<()> {
        self.results
            .write()
            .unwrap()
            .insert(result.payment_id, result.clone());
        Ok(())
    }

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentResult>> {
        Ok(self.results.read().unwrap().get(&payment_id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<PaymentResult>> {
        Ok(self
            .results
            .read()
            .unwrap()
            .values()
            .find(|r| r.idempotency_key == key)
            .cloned())
    }
}
