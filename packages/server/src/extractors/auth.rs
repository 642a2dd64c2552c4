use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::*;

use crate::config::AuthConfig;
use crate::entity::user;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt::{self, Claims};

/// Pull the raw token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::TokenMissing)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::TokenInvalid)
}

fn verify_claims(parts: &Parts, auth: &AuthConfig) -> Result<Claims, AppError> {
    let token = bearer_token(parts)?;
    jwt::verify(token, auth).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::TokenInvalid
    })
}

/// Validated token claims, without a user lookup.
///
/// Used where a token for a since-deleted account should read as
/// "not found" rather than "unauthorized".
pub struct BearerClaims(pub Claims);

impl FromRequestParts<AppState> for BearerClaims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        verify_claims(parts, &state.config.auth).map(BearerClaims)
    }
}

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// The token's subject is re-resolved against the user store on every
/// request; a valid token for an unknown email is rejected.
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub is_admin: bool,
}

impl AuthUser {
    /// Returns `Ok(())` if this user is `user_id` or an administrator.
    pub fn require_self_or_admin(&self, user_id: i32) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_admin {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verify_claims(parts, &state.config.auth)?;

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(&claims.sub))
            .one(&state.db)
            .await?
            .ok_or_else(|| {
                tracing::debug!(email = %claims.sub, "Token subject no longer exists");
                AppError::TokenInvalid
            })?;

        Ok(AuthUser {
            user_id: user.id,
            is_admin: state.config.auth.is_admin(&user.email),
            email: user.email,
        })
    }
}
