//! Single-use, time-boxed confirmation codes keyed by email address.

use crate::cache::{Cache, CacheError, CacheResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Codes expire one hour after issuance.
pub const CODE_TTL: Duration = Duration::from_secs(60 * 60);

/// A pending deletion request awaiting email confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl DeletionRequest {
    fn matches(&self, code: &str) -> bool {
        !self.used && self.expires_at > Utc::now() && self.code == code
    }
}

/// Issues and validates 6-digit confirmation codes.
///
/// One active request per email: issuing again overwrites the previous entry.
/// `consume` holds a store-wide lock around the read-check-mark sequence so
/// two concurrent confirmations cannot both spend the same code.
pub struct ConfirmationCodeStore {
    cache: Arc<dyn Cache>,
    consume_lock: Mutex<()>,
}

impl ConfirmationCodeStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            consume_lock: Mutex::new(()),
        }
    }

    fn storage_key(email: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(email.trim().to_lowercase().as_bytes());
        format!("deletion_code:{:x}", hasher.finalize())
    }

    fn generate_code() -> String {
        format!("{:06}", rand::rng().random_range(100_000..=999_999))
    }

    async fn load(&self, key: &str) -> CacheResult<Option<DeletionRequest>> {
        match self.cache.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CacheError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, request: &DeletionRequest) -> CacheResult<()> {
        let raw = serde_json::to_string(request)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.cache.set(key, raw, Some(CODE_TTL)).await
    }

    /// Issue a new code for `email`, invalidating any prior one.
    pub async fn issue(&self, email: &str) -> CacheResult<String> {
        let now = Utc::now();
        let request = DeletionRequest {
            email: email.to_string(),
            code: Self::generate_code(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(CODE_TTL).unwrap(),
            used: false,
        };

        self.save(&Self::storage_key(email), &request).await?;

        Ok(request.code)
    }

    /// Non-mutating check: false when missing, used, expired, or mismatched.
    pub async fn validate(&self, email: &str, code: &str) -> CacheResult<bool> {
        let entry = self.load(&Self::storage_key(email)).await?;
        Ok(entry.is_some_and(|request| request.matches(code)))
    }

    /// Re-persist the entry with `used = true` under its original TTL.
    pub async fn mark_used(&self, email: &str) -> CacheResult<()> {
        let key = Self::storage_key(email);
        if let Some(mut request) = self.load(&key).await? {
            request.used = true;
            self.save(&key, &request).await?;
        }
        Ok(())
    }

    /// Atomic validate-and-mark-used. Returns false without side effects when
    /// the code is missing, already used, expired, or does not match.
    pub async fn consume(&self, email: &str, code: &str) -> CacheResult<bool> {
        let _guard = self.consume_lock.lock().await;

        let key = Self::storage_key(email);
        match self.load(&key).await? {
            Some(mut request) if request.matches(code) => {
                request.used = true;
                self.save(&key, &request).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Withdraw an issued code, e.g. when the confirmation email could not be
    /// delivered.
    pub async fn remove(&self, email: &str) -> CacheResult<()> {
        self.cache.delete(&Self::storage_key(email)).await
    }
}
