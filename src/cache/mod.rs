//! Ephemeral key-value storage with native TTL support.
//!
//! The only values stored here are pending deletion requests, so the trait is
//! intentionally small and string-valued; callers serialize. The seam exists
//! so a shared backend (e.g. Redis) can be dropped in for multi-instance
//! deployments.

pub mod memory;

pub use memory::MemoryCache;

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Cache backend error: {0}")]
    Backend(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;
}
