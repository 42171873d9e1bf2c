//! File storage for uploaded images.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{AppError, AppResult};

/// Metadata of a stored file.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Storage key (file name relative to the storage root).
    pub key: String,
    /// Path on disk.
    pub path: PathBuf,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a file under `key`.
    async fn store(&self, key: &str, data: &[u8]) -> AppResult<StoredFile>;

    /// Read a file back.
    async fn read(&self, key: &str) -> AppResult<Vec<u8>>;

    /// Delete a file. Missing files are not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    /// Root directory of this backend.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        // Keys are flat file names; reject anything that could escape the root.
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(AppError::Storage(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn store(&self, key: &str, data: &[u8]) -> AppResult<StoredFile> {
        let path = self.resolve(key)?;

        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        Ok(StoredFile {
            key: key.to_string(),
            path,
            url: self.public_url(key),
            size: data.len() as u64,
        })
    }

    async fn read(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound(format!("File {key}")),
            _ => AppError::Storage(format!("Failed to read file: {e}")),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.resolve(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }
}

/// Build the stored file name for an upload: `{yyyyMMdd_HHmmss}_{suffix}.{ext}`.
#[must_use]
pub fn generate_stored_file_name(now: DateTime<Utc>, suffix: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        suffix,
        extension.to_lowercase()
    )
}
