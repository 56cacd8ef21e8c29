use std::sync::Arc;

use tracing::{info, warn};

use crate::db::RecordStore;
use crate::error::AppError;
use crate::models::{PublicProfile, UserRecord};
use crate::services::password::CredentialHasher;

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<RecordStore>,
    hasher: CredentialHasher,
}

impl UserDirectory {
    pub fn new(store: Arc<RecordStore>, hasher: CredentialHasher) -> Self {
        Self { store, hasher }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        raw_password: &str,
    ) -> Result<UserRecord, AppError> {
        // Surrounding whitespace is not part of a username, here or at login.
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::InvalidInput("Username is required".to_string()));
        }
        if raw_password.is_empty() {
            return Err(AppError::InvalidInput("Password is required".to_string()));
        }

        // Hash before taking the store lock; the uniqueness check and the
        // insert below happen inside one locked cycle.
        let password_hash = self.hasher.hash(raw_password).await?;
        let record = UserRecord {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            todos: Vec::new(),
            avatar: None,
        };

        let created = self
            .store
            .update(move |records| {
                if records.iter().any(|r| r.username == record.username) {
                    return Err(AppError::UsernameTaken);
                }
                records.push(record.clone());
                Ok(record)
            })
            .await?;

        info!("registered user {}", created.username);
        Ok(created)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        raw_password: &str,
    ) -> Result<UserRecord, AppError> {
        let username = username.trim();
        let found = self
            .store
            .read(|records| Ok(records.iter().find(|r| r.username == username).cloned()))
            .await?;

        let stored = found.as_ref().map(|r| r.password_hash.clone());
        let matched = self.hasher.verify(raw_password, stored).await?;

        match found {
            Some(record) if matched => Ok(record),
            _ => {
                warn!("failed login attempt");
                Err(AppError::InvalidCredentials)
            }
        }
    }

    /// Records `filename` as the user's avatar and returns the one it replaced.
    pub async fn set_avatar(
        &self,
        username: &str,
        filename: &str,
    ) -> Result<Option<String>, AppError> {
        self.store
            .update(|records| {
                let record = records
                    .iter_mut()
                    .find(|r| r.username == username)
                    .ok_or(AppError::UserNotFound)?;
                Ok(record.avatar.replace(filename.to_string()))
            })
            .await
    }

    pub async fn public_profile(&self, username: &str) -> Result<PublicProfile, AppError> {
        self.store
            .read(|records| {
                records
                    .iter()
                    .find(|r| r.username == username)
                    .map(UserRecord::to_profile)
                    .ok_or(AppError::UserNotFound)
            })
            .await
    }
}
