pub mod cleanup;
pub mod manager;

pub use cleanup::CleanupTask;
pub use manager::{
    IdempotencyCheckResult, IdempotencyConfig, IdempotencyManager, IdempotencyMetrics,
    IdempotencyRecord, IdempotencyStats,
};
