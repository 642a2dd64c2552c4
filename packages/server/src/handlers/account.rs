use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use common::mail::EmailMessage;
use sea_orm::prelude::Expr;
use sea_orm::*;
use tracing::instrument;

use crate::config::StorageConfig;
use crate::entity::{blog, review, user, user_token};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, BearerClaims};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::account::*;
use crate::state::AppState;
use crate::utils::upload;
use crate::utils::{hash, jwt, token};

pub fn profile_image_body_limit(storage: &StorageConfig) -> DefaultBodyLimit {
    DefaultBodyLimit::max(storage.max_upload_size as usize + 64 * 1024)
}

/// Store a fresh one-time token for `user_id` and return the plaintext.
async fn issue_email_token<C: ConnectionTrait>(
    conn: &C,
    state: &AppState,
    user_id: i32,
    purpose: &str,
) -> Result<String, AppError> {
    let plain = token::generate();
    let now = Utc::now();

    user_token::ActiveModel {
        user_id: Set(user_id),
        purpose: Set(purpose.to_string()),
        token_hash: Set(token::digest(&plain)),
        expires_at: Set(now + Duration::hours(state.config.auth.email_token_ttl_hours)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(plain)
}

/// Check a one-time token and, if valid, invalidate every token of that purpose for the user.
async fn consume_email_token<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    purpose: &str,
    presented: &str,
) -> Result<(), AppError> {
    let stored = user_token::Entity::find()
        .filter(user_token::Column::UserId.eq(user_id))
        .filter(user_token::Column::Purpose.eq(purpose))
        .filter(user_token::Column::TokenHash.eq(token::digest(presented)))
        .one(conn)
        .await?
        .ok_or(AppError::InvalidToken)?;

    if stored.expires_at <= Utc::now() {
        tracing::debug!(user_id, purpose, "One-time token expired");
        return Err(AppError::InvalidToken);
    }

    user_token::Entity::delete_many()
        .filter(user_token::Column::UserId.eq(user_id))
        .filter(user_token::Column::Purpose.eq(purpose))
        .exec(conn)
        .await?;

    Ok(())
}

fn link_base(state: &AppState) -> &str {
    state.config.mail.link_base_url.trim_end_matches('/')
}

async fn send_confirmation_email(
    state: &AppState,
    user: &user::Model,
    plain_token: &str,
) -> Result<(), AppError> {
    let link = format!(
        "{}/confirm-email?userId={}&token={}",
        link_base(state),
        user.id,
        token::encode_query_value(plain_token)
    );
    let message = EmailMessage {
        to: user.email.clone(),
        subject: "Confirm your email".into(),
        html_body: format!("Confirm your account by following <a href='{link}'>this link</a>."),
    };
    state.mailer.send(&message).await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/register",
    tag = "Account",
    operation_id = "register",
    summary = "Register a new account",
    description = "Creates an unconfirmed account and emails a confirmation link. \
        If the email cannot be sent the account still exists and 500 EMAIL_DELIVERY_FAILED is returned.",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input or email taken (VALIDATION_ERROR)", body = ErrorBody),
        (status = 500, description = "Confirmation email failed (EMAIL_DELIVERY_FAILED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let email = validate_register_request(&payload, state.config.auth.password_min_length)?;
    let taken = || AppError::Validation(format!("Email '{email}' is already taken"));

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .count(&state.db)
        .await?;
    if existing > 0 {
        return Err(taken());
    }

    let password = hash::hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let txn = state.db.begin().await?;

    let new_user = user::ActiveModel {
        email: Set(email.clone()),
        password: Set(password),
        name: Set(payload.name.trim().to_string()),
        surname: Set(payload.surname.trim().to_string()),
        image_url: Set(user::DEFAULT_IMAGE_URL.to_string()),
        email_confirmed: Set(false),
        access_failed_count: Set(0),
        lockout_end: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let user = new_user.insert(&txn).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Registration race condition: unique constraint caught on insert");
            taken()
        }
        _ => AppError::from(e),
    })?;

    let plain =
        issue_email_token(&txn, &state, user.id, user_token::PURPOSE_EMAIL_CONFIRMATION).await?;
    txn.commit().await?;

    send_confirmation_email(&state, &user, &plain).await?;

    Ok(Json(RegisterResponse {
        id: user.id,
        email: user.email,
        message: "Register is successful. Check your email to confirm the account".into(),
    }))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Account",
    operation_id = "login",
    summary = "Log in and receive a bearer token",
    description = "Returns a JWT valid for 30 minutes. For an unconfirmed account a new \
        confirmation email is sent and EMAIL_NOT_CONFIRMED is returned. Repeated wrong \
        passwords lock the account for a configured period (LOCKED_OUT).",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "VALIDATION_ERROR, INVALID_CREDENTIALS, EMAIL_NOT_CONFIRMED or LOCKED_OUT", body = ErrorBody),
        (status = 500, description = "Confirmation email failed (EMAIL_DELIVERY_FAILED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email, remember_me = payload.remember_me))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let auth = &state.config.auth;

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !user.email_confirmed {
        let plain =
            issue_email_token(&state.db, &state, user.id, user_token::PURPOSE_EMAIL_CONFIRMATION)
                .await?;
        send_confirmation_email(&state, &user, &plain).await?;
        return Err(AppError::EmailNotConfirmed);
    }

    let now = Utc::now();
    if user.lockout_end.is_some_and(|end| end > now) {
        return Err(AppError::LockedOut);
    }

    let is_valid = hash::verify_password(&payload.password, &user.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;

    if !is_valid {
        let failed = user.access_failed_count + 1;
        let lock = auth.max_failed_attempts > 0 && failed >= auth.max_failed_attempts;

        let mut active: user::ActiveModel = user.into();
        if lock {
            tracing::warn!("Account locked after {} failed attempts", failed);
            active.access_failed_count = Set(0);
            active.lockout_end = Set(Some(now + Duration::minutes(auth.lockout_minutes)));
        } else {
            active.access_failed_count = Set(failed);
        }
        active.update(&state.db).await?;

        return Err(if lock {
            AppError::LockedOut
        } else {
            AppError::InvalidCredentials
        });
    }

    if user.access_failed_count != 0 || user.lockout_end.is_some() {
        let mut active: user::ActiveModel = user.clone().into();
        active.access_failed_count = Set(0);
        active.lockout_end = Set(None);
        active.update(&state.db).await?;
    }

    let issued = jwt::sign(&user.email, auth)
        .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        email: user.email,
    }))
}

#[utoipa::path(
    get,
    path = "/confirm-email",
    tag = "Account",
    operation_id = "confirmEmail",
    summary = "Confirm an email address",
    description = "Target of the link sent at registration. The token is single use.",
    params(ConfirmEmailQuery),
    responses(
        (status = 200, description = "Email confirmed", body = MessageResponse),
        (status = 400, description = "Missing, tampered or expired token (INVALID_TOKEN)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(user_id = ?query.user_id))]
pub async fn confirm_email(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ConfirmEmailQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let (Some(user_id), Some(presented)) = (query.user_id.filter(|id| *id != 0), query.token)
    else {
        return Err(AppError::InvalidToken);
    };

    let txn = state.db.begin().await?;

    let user = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::InvalidToken)?;

    consume_email_token(&txn, user.id, user_token::PURPOSE_EMAIL_CONFIRMATION, &presented)
        .await?;

    let mut active: user::ActiveModel = user.into();
    active.email_confirmed = Set(true);
    active.update(&txn).await?;

    txn.commit().await?;
    Ok(Json(MessageResponse::new("Email confirmed successfully")))
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "Account",
    operation_id = "logout",
    summary = "Log out",
    description = "Tokens are stateless; the client discards its token.",
    responses((status = 200, description = "Logged out", body = MessageResponse)),
)]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::new("Logout"))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Account",
    operation_id = "me",
    summary = "Get the current user",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Account no longer exists (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, claims), fields(email = %claims.sub))]
pub async fn me(
    State(state): State<AppState>,
    BearerClaims(claims): BearerClaims,
) -> Result<Json<MeResponse>, AppError> {
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&claims.sub))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(MeResponse {
        user_name: user.email.clone(),
        email: user.email,
    }))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Account",
    operation_id = "listUsers",
    summary = "List all users",
    responses((status = 200, description = "All users", body = Vec<UserResponse>)),
)]
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Account",
    operation_id = "getUser",
    summary = "Get a user by ID",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Account",
    operation_id = "deleteUser",
    summary = "Delete a user",
    description = "Deletes the account together with its reviews and pending email tokens. \
        Replies other users wrote to those reviews are kept and become top-level reviews. \
        Returns 409 CONFLICT while the user still owns blogs. Allowed for the account itself \
        or an administrator.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "User still owns blogs (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, by = auth_user.user_id))]
pub async fn delete_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_self_or_admin(id)?;

    let txn = state.db.begin().await?;

    let user = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let blog_count = blog::Entity::find()
        .filter(blog::Column::UserId.eq(id))
        .count(&txn)
        .await?;
    if blog_count > 0 {
        return Err(AppError::Conflict(
            "Cannot delete a user who still owns blogs".into(),
        ));
    }

    let own_reviews = review::Entity::find()
        .filter(review::Column::UserId.eq(id))
        .all(&txn)
        .await?;
    let review_ids: Vec<i32> = own_reviews.iter().map(|r| r.id).collect();
    let mut touched_blogs: Vec<i32> = own_reviews.iter().map(|r| r.blog_id).collect();
    touched_blogs.sort_unstable();
    touched_blogs.dedup();

    if !review_ids.is_empty() {
        review::Entity::update_many()
            .col_expr(review::Column::ParentReviewId, Expr::value(Option::<i32>::None))
            .filter(review::Column::ParentReviewId.is_in(review_ids.clone()))
            .exec(&txn)
            .await?;

        review::Entity::delete_many()
            .filter(review::Column::Id.is_in(review_ids))
            .exec(&txn)
            .await?;
    }

    for blog_id in touched_blogs {
        let remaining = review::Entity::find()
            .filter(review::Column::BlogId.eq(blog_id))
            .count(&txn)
            .await?;
        blog::Entity::update_many()
            .col_expr(blog::Column::ReviewCount, Expr::value(remaining as i32))
            .filter(blog::Column::Id.eq(blog_id))
            .exec(&txn)
            .await?;
    }

    user_token::Entity::delete_many()
        .filter(user_token::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    if let Some(name) = upload::blob_name_from_url(&state.config.storage.public_base_url, &user.image_url) {
        upload::discard_blobs(&*state.blob_store, &[name.to_string()]).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/upload-profile-image",
    tag = "Account",
    operation_id = "uploadProfileImage",
    summary = "Upload a profile image",
    description = "Takes the first file part of the multipart body. Allowed for the account \
        itself or an administrator.",
    params(("id" = i32, Path, description = "User ID")),
    request_body(content_type = "multipart/form-data", description = "A single image file"),
    responses(
        (status = 200, description = "Profile image updated", body = ProfileImageResponse),
        (status = 400, description = "BAD_FILE_TYPE or VALIDATION_ERROR", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(id))]
pub async fn upload_profile_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ProfileImageResponse>, AppError> {
    auth_user.require_self_or_admin(id)?;

    let storage = &state.config.storage;
    let form = upload::read_form(&mut multipart, storage.max_upload_size).await?;
    let file = form
        .files
        .first()
        .ok_or_else(|| AppError::Validation("Missing image file".into()))?;
    upload::image_extension(file)?;

    let user = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let previous = user.image_url.clone();

    let stored = upload::store_image(&*state.blob_store, storage, file).await?;

    let mut active: user::ActiveModel = user.into();
    active.image_url = Set(stored.url.clone());
    if let Err(e) = active.update(&state.db).await {
        upload::discard_blobs(&*state.blob_store, &[stored.blob_name]).await;
        return Err(e.into());
    }

    if let Some(name) = upload::blob_name_from_url(&storage.public_base_url, &previous) {
        upload::discard_blobs(&*state.blob_store, &[name.to_string()]).await;
    }

    Ok(Json(ProfileImageResponse {
        image_url: stored.url,
    }))
}

#[utoipa::path(
    post,
    path = "/forgot-password",
    tag = "Account",
    operation_id = "forgotPassword",
    summary = "Request a password reset link",
    description = "Emails a reset link to a confirmed account. Whether unknown or unconfirmed \
        accounts are reported (404 / EMAIL_NOT_CONFIRMED) or answered with the generic success \
        message is controlled by `auth.reveal_unknown_accounts`.",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = MessageResponse),
        (status = 400, description = "VALIDATION_ERROR or EMAIL_NOT_CONFIRMED", body = ErrorBody),
        (status = 404, description = "No such account (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Reset email failed (EMAIL_DELIVERY_FAILED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = normalize_email(&payload.email)?;
    let reveal = state.config.auth.reveal_unknown_accounts;
    let sent = || Json(MessageResponse::new("Password reset link has been sent to your email"));

    let Some(user) = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?
    else {
        return if reveal {
            Err(AppError::NotFound("User not found".into()))
        } else {
            Ok(sent())
        };
    };

    if !user.email_confirmed {
        return if reveal {
            Err(AppError::EmailNotConfirmed)
        } else {
            Ok(sent())
        };
    }

    let plain = issue_email_token(&state.db, &state, user.id, user_token::PURPOSE_PASSWORD_RESET)
        .await?;
    let link = format!(
        "{}/reset-password?email={}&token={}",
        link_base(&state),
        token::encode_query_value(&user.email),
        token::encode_query_value(&plain)
    );
    let message = EmailMessage {
        to: user.email.clone(),
        subject: "Reset your password".into(),
        html_body: format!("Reset your password by following <a href='{link}'>this link</a>."),
    };
    state.mailer.send(&message).await?;

    Ok(sent())
}

#[utoipa::path(
    post,
    path = "/reset-password",
    tag = "Account",
    operation_id = "resetPassword",
    summary = "Set a new password with a reset token",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "VALIDATION_ERROR or INVALID_TOKEN", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if payload.password != payload.confirm_password {
        return Err(AppError::Validation(
            "Password and confirmation do not match".into(),
        ));
    }
    validate_password(&payload.password, state.config.auth.password_min_length)?;
    let email = normalize_email(&payload.email)?;

    let password = hash::hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let txn = state.db.begin().await?;

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&txn)
        .await?
        .ok_or(AppError::InvalidToken)?;

    consume_email_token(&txn, user.id, user_token::PURPOSE_PASSWORD_RESET, &payload.token)
        .await?;

    let mut active: user::ActiveModel = user.into();
    active.password = Set(password);
    active.access_failed_count = Set(0);
    active.lockout_end = Set(None);
    active.update(&txn).await?;

    txn.commit().await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
