use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::entity::user;
use crate::error::AppError;

/// Passwords longer than this are rejected regardless of configuration.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Request body for user registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// Email address; becomes the login name.
    #[schema(example = "a@x.com")]
    pub email: String,
    /// Must contain upper and lower case letters, a digit and a symbol.
    #[schema(example = "Pw1!")]
    pub password: String,
    #[schema(example = "Ada")]
    pub name: String,
    #[schema(example = "Lovelace")]
    pub surname: String,
}

/// Validate a registration and return the normalized email.
pub fn validate_register_request(
    payload: &RegisterRequest,
    password_min_length: usize,
) -> Result<String, AppError> {
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password, password_min_length)?;
    validate_name("Name", &payload.name)?;
    validate_name("Surname", &payload.surname)?;
    Ok(email)
}

/// Trim and lower-case an email, rejecting anything not shaped like `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let has_tld = email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.contains('.'));

    if !email.validate_email() || !has_tld {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid email address",
            raw.trim()
        )));
    }
    Ok(email)
}

/// Password policy: length bounds plus one of each character class.
pub fn validate_password(password: &str, min_length: usize) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < min_length || len > PASSWORD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be {min_length}-{PASSWORD_MAX_LENGTH} characters"
        )));
    }

    let mut missing = Vec::new();
    if !password.chars().any(char::is_uppercase) {
        missing.push("an uppercase letter");
    }
    if !password.chars().any(char::is_lowercase) {
        missing.push("a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit");
    }
    if password.chars().all(char::is_alphanumeric) {
        missing.push("a non-alphanumeric character");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Password must contain {}",
            missing.join(", ")
        )))
    }
}

fn validate_name(label: &str, value: &str) -> Result<(), AppError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > 64 {
        return Err(AppError::Validation(format!("{label} must be 1-64 characters")));
    }
    Ok(())
}

/// Successful registration response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "a@x.com")]
    pub email: String,
    #[schema(example = "Register is successful. Check your email to confirm the account")]
    pub message: String,
}

/// Request body for login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "a@x.com")]
    pub email: String,
    #[schema(example = "Pw1!")]
    pub password: String,
    /// Accepted for client compatibility; tokens are stateless and always
    /// expire after 30 minutes.
    #[serde(default, alias = "rememberMe")]
    pub remember_me: bool,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::Validation("Email must not be empty".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token valid for 30 minutes.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[schema(example = "a@x.com")]
    pub email: String,
}

/// Query string of the confirmation link.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConfirmEmailQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<i32>,
    pub token: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ForgotPasswordRequest {
    #[schema(example = "a@x.com")]
    pub email: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordRequest {
    #[schema(example = "a@x.com")]
    pub email: String,
    /// Token from the reset link.
    pub token: String,
    #[schema(example = "N3w!pass")]
    pub password: String,
    #[serde(alias = "confirmPassword")]
    #[schema(example = "N3w!pass")]
    pub confirm_password: String,
}

/// Plain acknowledgement.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logout")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identity behind the presented token.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    #[schema(example = "a@x.com")]
    pub user_name: String,
    #[schema(example = "a@x.com")]
    pub email: String,
}

/// Public profile. Never carries the credential hash or lockout state.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "a@x.com")]
    pub email: String,
    pub name: String,
    pub surname: String,
    #[schema(example = "default")]
    pub image_url: String,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            surname: u.surname,
            image_url: u.image_url,
            email_confirmed: u.email_confirmed,
            created_at: u.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileImageResponse {
    #[schema(example = "http://localhost:3000/blobs/4f1c2b1e-6d0e-4d0c-9a53-7f8f1b1f0c11.png")]
    pub image_url: String,
}
