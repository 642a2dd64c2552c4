use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::{MailConfig, S3Config, StorageBackend, StorageConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Symmetric HS256 signing key.
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Lifetime of email confirmation and password reset tokens. Default: 24.
    #[serde(default = "default_email_token_ttl_hours")]
    pub email_token_ttl_hours: i64,
    /// Failed password checks before lockout; 0 disables lockout. Default: 5.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: i32,
    /// Default: 5.
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
    /// Default: 4.
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// When true, forgot-password answers 404 for unknown emails. Default: true.
    #[serde(default = "default_reveal_unknown_accounts")]
    pub reveal_unknown_accounts: bool,
    /// Accounts allowed to delete or edit other users.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

fn default_email_token_ttl_hours() -> i64 {
    24
}
fn default_max_failed_attempts() -> i32 {
    5
}
fn default_lockout_minutes() -> i64 {
    5
}
fn default_password_min_length() -> usize {
    4
}
fn default_reveal_unknown_accounts() -> bool {
    true
}

impl AuthConfig {
    /// Build an auth config with defaults for everything except the JWT triple.
    pub fn new(
        jwt_secret: impl Into<String>,
        jwt_issuer: impl Into<String>,
        jwt_audience: impl Into<String>,
    ) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            jwt_issuer: jwt_issuer.into(),
            jwt_audience: jwt_audience.into(),
            email_token_ttl_hours: default_email_token_ttl_hours(),
            max_failed_attempts: default_max_failed_attempts(),
            lockout_minutes: default_lockout_minutes(),
            password_min_length: default_password_min_length(),
            reveal_unknown_accounts: default_reveal_unknown_accounts(),
            admin_emails: Vec::new(),
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewConfig {
    /// Deepest allowed reply chain; a top-level review has depth 1. Default: 64.
    #[serde(default = "default_max_reply_depth")]
    pub max_reply_depth: usize,
}

fn default_max_reply_depth() -> usize {
    64
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_reply_depth: default_max_reply_depth(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub reviews: ReviewConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("BLOG_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", vec!["http://localhost:5173"])?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.url", "sqlite://blog.db?mode=rwc")?
            .set_default("auth.jwt_issuer", "blog-server")?
            .set_default("auth.jwt_audience", "blog-client")?
            // Load from config/config.toml
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., BLOG__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("BLOG")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .with_list_parse_key("auth.admin_emails")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
