use async_trait::async_trait;

use super::error::StorageError;

/// Path-addressed storage for extracted episode archives.
///
/// Keys are `/`-separated paths relative to the storage root, e.g.
/// `Friends_S01E05/S01E05_cluster-01/frame_000.jpg`.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Write a file, creating parent directories. Overwrites an existing file.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Check whether a file or directory exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Recursively delete a directory.
    ///
    /// Returns `true` if it was deleted, `false` if it did not exist.
    async fn remove_tree(&self, key: &str) -> Result<bool, StorageError>;

    /// Move a directory to a new key. The destination must not exist.
    async fn rename_tree(&self, from: &str, to: &str) -> Result<(), StorageError>;
}
