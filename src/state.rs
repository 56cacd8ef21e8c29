use std::sync::Arc;

use crate::config::Config;
use crate::db::{IdGenerator, MonotonicIds, RecordStore};
use crate::error::AppError;
use crate::services::{AvatarStore, CredentialHasher, TodoCollection, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub users: UserDirectory,
    pub todos: TodoCollection,
    pub avatars: AvatarStore,
    pub max_avatar_bytes: usize,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let hasher = CredentialHasher::new(config.hash_memory_kib, config.hash_iterations)?;
        Self::build(config, hasher, Arc::new(MonotonicIds::new())).await
    }

    /// Wires the services over one shared record store.
    pub async fn build(
        config: &Config,
        hasher: CredentialHasher,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, AppError> {
        let store = Arc::new(RecordStore::open(&config.data_file, config.write_retries).await?);
        let avatars = AvatarStore::open(&config.upload_dir).await?;

        Ok(Self {
            users: UserDirectory::new(store.clone(), hasher),
            todos: TodoCollection::new(store, ids),
            avatars,
            max_avatar_bytes: config.max_avatar_bytes,
        })
    }
}
