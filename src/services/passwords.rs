// src/services/passwords.rs
//! bcrypt password hashing.
//!
//! bcrypt is deliberately slow, so both operations run on the blocking
//! thread pool instead of stalling the async workers.

use thiserror::Error;
use tokio::task;
use tracing::warn;

use crate::common::ApiError;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("stored password hash is malformed")]
    MalformedHash,

    #[error("password task failed: {0}")]
    TaskFailed(String),
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        ApiError::InternalServer(e.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;

        task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// `Ok(false)` on mismatch; `Err(MalformedHash)` if `hash` is not a bcrypt hash.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, PasswordError> {
        let plaintext = plaintext.to_string();
        let hash = hash.to_string();

        task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
            .map_err(|e| {
                warn!(error = %e, "bcrypt rejected stored hash");
                PasswordError::MalformedHash
            })
    }
}
