use serde::Deserialize;

/// Which blob store implementation to construct.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// S3-compatible bucket settings. Only read when `backend = "s3"`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3Config {
    pub bucket: String,
    /// Region name, e.g. "eu-central-1".
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for non-AWS providers (MinIO, R2, ...).
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

fn default_s3_region() -> String {
    "us-east-1".into()
}

/// Blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend. Default: "./data/blobs".
    #[serde(default = "default_filesystem_path")]
    pub filesystem_path: String,
    /// Base URL that stored blob names are appended to when building public URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Maximum size of a single uploaded file in bytes. Default: 10 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    #[serde(default)]
    pub s3: S3Config,
}

fn default_filesystem_path() -> String {
    "./data/blobs".into()
}
fn default_public_base_url() -> String {
    "http://localhost:3000/blobs".into()
}
fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            filesystem_path: default_filesystem_path(),
            public_base_url: default_public_base_url(),
            max_upload_size: default_max_upload_size(),
            s3: S3Config::default(),
        }
    }
}

/// Outgoing email configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    /// When false, messages are only written to the log. Default: false.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. "Blog <no-reply@example.com>".
    #[serde(default = "default_from")]
    pub from: String,
    /// Front-end origin used to build confirmation and reset links.
    #[serde(default = "default_link_base_url")]
    pub link_base_url: String,
}

fn default_smtp_host() -> String {
    "localhost".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_from() -> String {
    "no-reply@localhost".into()
}
fn default_link_base_url() -> String {
    "http://localhost:5173".into()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from: default_from(),
            link_base_url: default_link_base_url(),
        }
    }
}
