//! Object storage trait and the local filesystem backend.

use async_trait::async_trait;
use bundle_cache_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Trait for archive storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `source` under `key`. Returns the uploaded size.
    async fn put(&self, source: &Path, key: &str) -> Result<u64>;

    /// Stream the object stored under `key` into `dest`. Returns the number
    /// of bytes written. A missing object is [`Error::ObjectNotFound`].
    async fn get(&self, key: &str, dest: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Filesystem-backed store for local development and tests.
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let sanitized_key = key.replace(['/', '\\', ':'], "_");
        self.root_dir.join(sanitized_key)
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, source: &Path, key: &str) -> Result<u64> {
        let key_path = self.key_path(key);
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create store dir: {}", e)))?;

        let size = tokio::fs::copy(source, &key_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", key, e)))?;

        debug!(key, size, path = %key_path.display(), "Stored object");
        Ok(size)
    }

    async fn get(&self, key: &str, dest: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        let key_path = self.key_path(key);
        let mut file = match tokio::fs::File::open(&key_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ObjectNotFound(key.to_string()));
            }
            Err(e) => return Err(Error::Storage(format!("Failed to read {}: {}", key, e))),
        };

        let size = tokio::io::copy(&mut file, &mut *dest)
            .await
            .map_err(|e| Error::Storage(format!("Failed to copy {}: {}", key, e)))?;
        dest.flush().await?;

        debug!(key, size, "Fetched object");
        Ok(size)
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
