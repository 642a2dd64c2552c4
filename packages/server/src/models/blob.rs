use serde::Serialize;

/// One file accepted by the upload gate.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadedBlobResponse {
    /// Original client-side file name.
    #[schema(example = "cat.png")]
    pub file_name: String,
    /// Generated unique name in the blob store.
    #[schema(example = "4f1c2b1e-6d0e-4d0c-9a53-7f8f1b1f0c11.png")]
    pub blob_name: String,
    #[schema(example = "http://localhost:3000/blobs/4f1c2b1e-6d0e-4d0c-9a53-7f8f1b1f0c11.png")]
    pub url: String,
}
