pub mod circuit;
pub mod config;
pub mod error;
pub mod gateway;
pub mod idempotency;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod retry;
pub mod services;

pub use error::{AppError, Result};
