use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::UserRecord;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// The whole user collection, kept in one JSON document.
///
/// Every access takes `lock`, so a load → mutate → save cycle run through
/// [`RecordStore::update`] cannot interleave with another one. Two requests
/// touching the document at the same time therefore never lose each other's
/// writes.
pub struct RecordStore {
    path: PathBuf,
    write_retries: u32,
    lock: Mutex<()>,
}

impl RecordStore {
    /// Opens the document at `path`, creating it with an empty collection
    /// when it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>, write_retries: u32) -> Result<Self, AppError> {
        let path = path.into();

        if !fs::try_exists(&path).await? {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await?;
            }
            write_atomically(&path, b"[]").await?;
            info!("created empty record store at {}", path.display());
        }

        Ok(Self {
            path,
            write_retries,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<UserRecord>, AppError> {
        let _guard = self.lock.lock().await;
        self.read_document().await
    }

    pub async fn save(&self, records: &[UserRecord]) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        self.write_document(records).await
    }

    /// Runs `f` over a freshly loaded collection without writing anything back.
    pub async fn read<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&[UserRecord]) -> Result<T, AppError>,
    {
        let _guard = self.lock.lock().await;
        let records = self.read_document().await?;
        f(&records)
    }

    /// Loads the collection, applies `f` and persists the result, all while
    /// holding the store lock. When `f` fails nothing is written.
    pub async fn update<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Vec<UserRecord>) -> Result<T, AppError>,
    {
        let _guard = self.lock.lock().await;
        let mut records = self.read_document().await?;
        let out = f(&mut records)?;
        self.write_document(&records).await?;
        Ok(out)
    }

    async fn read_document(&self) -> Result<Vec<UserRecord>, AppError> {
        let raw = fs::read(&self.path).await?;
        let records: Vec<UserRecord> = serde_json::from_slice(&raw)?;
        debug!("loaded {} user records", records.len());
        Ok(records)
    }

    async fn write_document(&self, records: &[UserRecord]) -> Result<(), AppError> {
        let body = serde_json::to_vec_pretty(records)?;

        let mut attempt = 0;
        loop {
            match write_atomically(&self.path, &body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.write_retries => {
                    attempt += 1;
                    warn!(
                        "writing {} failed (attempt {}/{}): {}",
                        self.path.display(),
                        attempt,
                        self.write_retries + 1,
                        e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(AppError::StorageUnavailable(e)),
            }
        }
    }
}

/// Writes `body` next to `path` and renames it into place, so readers only
/// ever observe the old or the new document.
async fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TodoItem;

    fn record(username: &str) -> UserRecord {
        UserRecord {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: "hash".to_string(),
            todos: vec![TodoItem {
                id: "1".to_string(),
                text: "water plants".to_string(),
                completed: false,
            }],
            avatar: None,
        }
    }

    #[tokio::test]
    async fn test_open_creates_empty_document() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("data").join("users.json");

        let store = RecordStore::open(&path, 0).await.expect("Failed to open store");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_keeps_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, serde_json::to_vec(&vec![record("alice")]).unwrap()).unwrap();

        let store = RecordStore::open(&path, 0).await.unwrap();
        let records = store.load().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "alice");
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("users.json"), 0).await.unwrap();

        store.save(&[record("alice"), record("bob")]).await.unwrap();
        let records = store.load().await.unwrap();

        assert_eq!(records, vec![record("alice"), record("bob")]);
        assert!(!temp_path(store.path()).exists());
    }

    #[tokio::test]
    async fn test_save_of_load_leaves_document_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("users.json"), 0).await.unwrap();
        store.save(&[record("alice")]).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let records = store.load().await.unwrap();
        store.save(&records).await.unwrap();

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = RecordStore::open(&path, 0).await.unwrap();

        assert!(matches!(store.load().await, Err(AppError::CorruptData(_))));
    }

    #[tokio::test]
    async fn test_wrong_schema_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"{"username":"alice"}"#).unwrap();

        let store = RecordStore::open(&path, 0).await.unwrap();

        assert!(matches!(store.load().await, Err(AppError::CorruptData(_))));
    }

    #[tokio::test]
    async fn test_missing_document_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = RecordStore::open(&path, 0).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(store.load().await, Err(AppError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("users.json"), 0).await.unwrap();
        store.save(&[record("alice")]).await.unwrap();

        let result: Result<(), AppError> = store
            .update(|records| {
                records.clear();
                Err(AppError::UserNotFound)
            })
            .await;

        assert!(matches!(result, Err(AppError::UserNotFound)));
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = RecordStore::open(&path, 2).await.unwrap();
        // A directory squatting on the temp path makes every write attempt fail.
        std::fs::create_dir(temp_path(&path)).unwrap();

        let result = store.save(&[record("alice")]).await;

        assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }
}
