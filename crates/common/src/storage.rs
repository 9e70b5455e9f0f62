//! Media storage abstraction.
//!
//! The processing core only stores and deletes bytes; transcoding and
//! thumbnailing are outside its concern.

use std::path::PathBuf;

use crate::config::MediaConfig;
use crate::{AppError, AppResult};

/// Stored file metadata.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Storage key (path relative to the backend root).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the file.
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a file under `key`.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str)
    -> AppResult<UploadedFile>;

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

    /// Create a backend from the media section of the configuration.
    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.storage_path.clone(), config.base_url.clone())
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedFile> {
        let path = self.base_path.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {e}")))?;

        let md5 = format!("{:x}", md5::compute(data));

        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("Failed to delete file: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.base_path.join(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to stat file: {e}")))
    }
}

/// Generate a unique storage key for a file.
#[must_use]
pub fn generate_storage_key(account_id: &str, original_name: &str) -> String {
    use chrono::Utc;

    let now = Utc::now();
    let date_path = now.format("%Y/%m/%d").to_string();

    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");

    format!(
        "{date_path}/{account_id}/{}.{}",
        uuid::Uuid::new_v4().simple(),
        extension.to_ascii_lowercase()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_storage_key() {
        let key = generate_storage_key("account123", "photo.JPG");
        assert!(key.contains("account123"));
        assert!(key.ends_with(".jpg"));
    }

    #[test]
    fn test_generate_storage_key_no_extension() {
        let key = generate_storage_key("account123", "file");
        assert!(key.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_local_upload_and_delete() {
        let dir = std::env::temp_dir().join(format!("plaza-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(dir.clone(), "https://plaza.example/files/".to_string());

        let file = storage
            .upload("a/b.txt", b"hello", "text/plain")
            .await
            .unwrap();
        assert_eq!(file.size, 5);
        assert_eq!(file.url, "https://plaza.example/files/a/b.txt");
        assert!(storage.exists("a/b.txt").await.unwrap());

        storage.delete("a/b.txt").await.unwrap();
        assert!(!storage.exists("a/b.txt").await.unwrap());
        // deleting twice is fine
        storage.delete("a/b.txt").await.unwrap();

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
