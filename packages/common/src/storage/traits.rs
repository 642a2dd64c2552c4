use async_trait::async_trait;

use super::error::StorageError;

/// Flat, name-addressed blob storage.
///
/// Names are chosen by the caller (typically a generated unique file name)
/// and must pass [`validate_blob_name`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `name`, replacing any existing blob with that name.
    async fn put(
        &self,
        name: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<(), StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// List the names of all stored blobs, sorted.
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}

/// Reject names that are empty, hidden, or contain path components.
pub fn validate_blob_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(|c| c.is_ascii_control())
    {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
