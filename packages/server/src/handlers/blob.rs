use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::blob::UploadedBlobResponse;
use crate::state::AppState;
use crate::utils::upload;

#[utoipa::path(
    post,
    path = "/",
    tag = "Blobs",
    operation_id = "uploadBlobs",
    summary = "Upload image files to blob storage",
    description = "Every file part goes through the image gate. All files are checked before \
        any is stored; if storing one fails, the ones already stored are removed.",
    request_body(content_type = "multipart/form-data", description = "One or more image files"),
    responses(
        (status = 200, description = "Stored files", body = Vec<UploadedBlobResponse>),
        (status = 400, description = "BAD_FILE_TYPE or VALIDATION_ERROR", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_files(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadedBlobResponse>>, AppError> {
    let storage = &state.config.storage;
    let form = upload::read_form(&mut multipart, storage.max_upload_size).await?;
    if form.files.is_empty() {
        return Err(AppError::Validation("No files uploaded".into()));
    }
    upload::check_images(&form.files)?;

    let stored = upload::store_images(&*state.blob_store, storage, &form.files).await?;
    tracing::info!("Stored {} blobs", stored.len());

    let data = form
        .files
        .into_iter()
        .zip(stored)
        .map(|(file, s)| UploadedBlobResponse {
            file_name: file.file_name,
            blob_name: s.blob_name,
            url: s.url,
        })
        .collect();

    Ok(Json(data))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Blobs",
    operation_id = "listBlobs",
    summary = "List stored blob names",
    responses((status = 200, description = "Blob names, sorted", body = Vec<String>)),
)]
#[instrument(skip(state))]
pub async fn list_blobs(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.blob_store.list().await?))
}

#[utoipa::path(
    get,
    path = "/{name}",
    tag = "Blobs",
    operation_id = "getBlob",
    summary = "Download a stored blob",
    description = "Serves the bytes behind public URLs built on the default `storage.public_base_url`.",
    params(("name" = String, Path, description = "Blob name")),
    responses(
        (status = 200, description = "Blob content"),
        (status = 400, description = "Invalid blob name (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Blob not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(name))]
pub async fn get_blob(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.blob_store.get(&name).await?;
    let content_type = mime_guess::from_path(&name)
        .first_or_octet_stream()
        .to_string();

    Ok(([(header::CONTENT_TYPE, content_type)], data))
}
