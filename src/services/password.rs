use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::warn;

use crate::error::AppError;

/// Argon2id hashing with a fixed cost. Work runs on the blocking pool so
/// request tasks are not stalled by it.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    dummy_hash: Arc<str>,
}

impl CredentialHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| AppError::Config(format!("invalid hash parameters: {}", e)))?;
        // Checked against when a username is unknown, so that path costs the
        // same as a real comparison.
        let dummy_hash = hash_with(&params, "not-a-real-password")?;
        Ok(Self {
            params,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub async fn hash(&self, raw: &str) -> Result<String, AppError> {
        let params = self.params.clone();
        let raw = raw.to_owned();
        tokio::task::spawn_blocking(move || hash_with(&params, &raw))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
    }

    /// Checks `raw` against `stored`, or against the dummy hash when there is
    /// no stored hash. Returns `false` in the latter case regardless.
    pub async fn verify(&self, raw: &str, stored: Option<String>) -> Result<bool, AppError> {
        let known = stored.is_some();
        let hash = stored.unwrap_or_else(|| self.dummy_hash.to_string());
        let raw = raw.to_owned();

        let matched = tokio::task::spawn_blocking(move || verify_with(&raw, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))?;
        Ok(known && matched)
    }
}

fn hash_with(params: &Params, raw: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))
}

fn verify_with(raw: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("stored password hash is malformed: {}", e);
            false
        }
    }
}
