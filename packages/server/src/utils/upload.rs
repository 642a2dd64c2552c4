//! Image upload gate and multipart form reading shared by the blog,
//! profile image and raw blob upload endpoints.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::Field;
use common::config::StorageConfig;
use common::storage::BlobStore;
use uuid::Uuid;

use crate::error::AppError;

/// File extensions accepted as images (lower case, without the dot).
pub const ACCEPTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Upper bound on file parts in one multipart request.
pub const MAX_FILES_PER_REQUEST: usize = 16;

/// A file part read fully into memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A multipart body split into its text fields and file parts.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Text value of a field, if present.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A blob written through the gate.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub blob_name: String,
    pub url: String,
}

/// Read every part of a multipart body.
///
/// Parts with a file name are collected as files (each capped at
/// `max_file_size` bytes); the rest are read as text. Empty file parts with
/// an empty file name, as browsers send for an untouched file input, are
/// skipped.
pub async fn read_form(
    multipart: &mut Multipart,
    max_file_size: u64,
) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = read_limited(field, max_file_size).await?;
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                if form.files.len() == MAX_FILES_PER_REQUEST {
                    return Err(AppError::Validation(format!(
                        "At most {MAX_FILES_PER_REQUEST} files may be uploaded at once"
                    )));
                }
                form.files.push(UploadedFile {
                    field_name: name,
                    file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;
                form.fields.insert(name, text);
            }
        }
    }

    Ok(form)
}

async fn read_limited(mut field: Field<'_>, max_size: u64) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
    {
        if (data.len() + chunk.len()) as u64 > max_size {
            return Err(AppError::Validation(format!(
                "File exceeds maximum size of {max_size} bytes"
            )));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(data)
}

/// Check a file against the image allow-list and return its normalized extension.
///
/// The extension decides; a declared content type, when it is specific
/// (anything but `application/octet-stream`), must also be an `image/*` type.
pub fn image_extension(file: &UploadedFile) -> Result<String, AppError> {
    let rejected = || AppError::BadFileType(format!("File '{}' is not an accepted image", file.file_name));

    let ext = file
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ACCEPTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(rejected)?;

    if let Some(declared) = file.content_type.as_deref() {
        let declared = declared.trim().to_ascii_lowercase();
        if declared != "application/octet-stream" && !declared.starts_with("image/") {
            return Err(rejected());
        }
    }

    Ok(ext)
}

/// Run every file through [`image_extension`] without storing anything.
pub fn check_images(files: &[UploadedFile]) -> Result<(), AppError> {
    files.iter().try_for_each(|f| image_extension(f).map(|_| ()))
}

/// Unique blob name for a new upload.
pub fn generate_blob_name(ext: &str) -> String {
    format!("{}.{ext}", Uuid::new_v4())
}

/// Public URL of a blob: the configured base URL with the name appended.
pub fn public_url(base_url: &str, blob_name: &str) -> String {
    format!("{}/{blob_name}", base_url.trim_end_matches('/'))
}

/// Inverse of [`public_url`], for URLs that point into our own storage.
pub fn blob_name_from_url<'a>(base_url: &str, url: &'a str) -> Option<&'a str> {
    url.strip_prefix(base_url.trim_end_matches('/'))?
        .strip_prefix('/')
        .filter(|name| !name.is_empty() && !name.contains('/'))
}

/// Gate one file and write it to the blob store.
pub async fn store_image(
    store: &dyn BlobStore,
    storage: &StorageConfig,
    file: &UploadedFile,
) -> Result<StoredImage, AppError> {
    let ext = image_extension(file)?;
    let blob_name = generate_blob_name(&ext);
    let content_type = mime_guess::from_ext(&ext).first().map(|m| m.to_string());

    store
        .put(&blob_name, content_type.as_deref(), &file.data)
        .await?;

    Ok(StoredImage {
        url: public_url(&storage.public_base_url, &blob_name),
        blob_name,
    })
}

/// Store several images; if any fails, the ones already written are removed.
pub async fn store_images(
    store: &dyn BlobStore,
    storage: &StorageConfig,
    files: &[UploadedFile],
) -> Result<Vec<StoredImage>, AppError> {
    let mut stored = Vec::with_capacity(files.len());

    for file in files {
        match store_image(store, storage, file).await {
            Ok(image) => stored.push(image),
            Err(e) => {
                let names: Vec<String> = stored.into_iter().map(|s| s.blob_name).collect();
                discard_blobs(store, &names).await;
                return Err(e);
            }
        }
    }

    Ok(stored)
}

/// Delete blobs, logging instead of failing.
pub async fn discard_blobs(store: &dyn BlobStore, names: &[String]) {
    for name in names {
        if let Err(e) = store.delete(name).await {
            tracing::warn!(blob = %name, "Failed to remove blob: {}", e);
        }
    }
}
