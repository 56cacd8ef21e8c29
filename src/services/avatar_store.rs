use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;

/// Directory holding uploaded avatar images, one file per user.
#[derive(Clone, Debug)]
pub struct AvatarStore {
    dir: PathBuf,
}

impl AvatarStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<username>_avatar<.ext>`. Username bytes outside `[A-Za-z0-9-]` are
    /// written as `_xx` hex escapes, so the name stays inside the directory
    /// and no two usernames share a file.
    pub fn file_name_for(username: &str, original_name: Option<&str>) -> String {
        let mut stem = String::with_capacity(username.len());
        for byte in username.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(byte as char);
            } else {
                stem.push_str(&format!("_{:02x}", byte));
            }
        }

        let ext = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();

        format!("{}_avatar{}", stem, ext)
    }

    /// Writes the upload and returns the file name it was stored under.
    pub async fn store(
        &self,
        username: &str,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
        }

        let filename = Self::file_name_for(username, original_name);
        let target = self.dir.join(&filename);
        let partial = self.dir.join(format!(".{}.part", Uuid::new_v4()));

        fs::write(&partial, bytes).await?;
        if let Err(e) = fs::rename(&partial, &target).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        info!("stored avatar {} ({} bytes)", filename, bytes.len());
        Ok(filename)
    }

    /// Best-effort removal of an avatar that has been superseded.
    pub async fn remove(&self, filename: &str) {
        if filename.contains(['/', '\\']) || filename.starts_with('.') {
            warn!("refusing to remove suspicious avatar name {:?}", filename);
            return;
        }
        if let Err(e) = fs::remove_file(self.dir.join(filename)).await {
            warn!("failed to remove old avatar {}: {}", filename, e);
        }
    }
}
