use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use super::error::StorageError;
use super::traits::{BlobStore, validate_blob_name};
use crate::config::S3Config;

/// Blob store backed by an S3-compatible bucket.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    max_size: u64,
}

impl S3BlobStore {
    pub fn new(config: &S3Config, max_size: u64) -> Result<Self, StorageError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .map_err(|e| StorageError::Remote(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Remote(format!("invalid credentials: {e}")))?;

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Remote(e.to_string()))?
            .with_path_style();

        Ok(Self { bucket, max_size })
    }
}

fn remote(err: s3::error::S3Error) -> StorageError {
    StorageError::Remote(err.to_string())
}

fn check_status(status: u16, name: &str) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(name.to_string())),
        other => Err(StorageError::Remote(format!(
            "unexpected status {other} for {name}"
        ))),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        name: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<(), StorageError> {
        validate_blob_name(name)?;
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let content_type = content_type.unwrap_or("application/octet-stream");
        let response = self
            .bucket
            .put_object_with_content_type(name, data, content_type)
            .await
            .map_err(remote)?;
        check_status(response.status_code(), name)
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_blob_name(name)?;
        let response = self.bucket.get_object(name).await.map_err(remote)?;
        check_status(response.status_code(), name)?;
        Ok(response.bytes().to_vec())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        validate_blob_name(name)?;
        let (_, status) = self.bucket.head_object(name).await.map_err(remote)?;
        match check_status(status, name) {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        if !self.exists(name).await? {
            return Ok(false);
        }
        let response = self.bucket.delete_object(name).await.map_err(remote)?;
        check_status(response.status_code(), name)?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let pages = self
            .bucket
            .list(String::new(), None)
            .await
            .map_err(remote)?;
        let mut names: Vec<String> = pages
            .into_iter()
            .flat_map(|page| page.contents.into_iter().map(|object| object.key))
            .collect();
        names.sort();
        Ok(names)
    }
}
