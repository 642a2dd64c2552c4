mod error;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3_store;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::StorageError;
pub use traits::{BlobStore, validate_blob_name};

use crate::config::{StorageBackend, StorageConfig};

/// Construct the blob store selected by `config.backend`.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, StorageError> {
    match config.backend {
        StorageBackend::Filesystem => {
            let store = filesystem::FilesystemBlobStore::new(
                PathBuf::from(&config.filesystem_path),
                config.max_upload_size,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "object-storage")]
        StorageBackend::S3 => Ok(Arc::new(s3_store::S3BlobStore::new(
            &config.s3,
            config.max_upload_size,
        )?)),
        #[cfg(not(feature = "object-storage"))]
        StorageBackend::S3 => Err(StorageError::Remote(
            "built without the object-storage feature".into(),
        )),
    }
}
