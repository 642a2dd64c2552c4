use axum::extract::{Path, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{blog, review};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::review::*;
use crate::state::AppState;

async fn ensure_blog<C: ConnectionTrait>(db: &C, blog_id: i32) -> Result<(), AppError> {
    let exists = blog::Entity::find_by_id(blog_id).count(db).await?;
    if exists == 0 {
        return Err(AppError::NotFound("Blog not found".into()));
    }
    Ok(())
}

/// Depth of `parent` within its thread, counting `parent` itself, capped at `limit`.
async fn thread_depth<C: ConnectionTrait>(
    db: &C,
    parent: &review::Model,
    limit: usize,
) -> Result<usize, AppError> {
    let mut depth = 1;
    let mut next = parent.parent_review_id;

    while let Some(id) = next {
        if depth >= limit {
            break;
        }
        let Some(ancestor) = review::Entity::find_by_id(id).one(db).await? else {
            break;
        };
        depth += 1;
        next = ancestor.parent_review_id;
    }
    Ok(depth)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Reviews",
    operation_id = "listReviews",
    summary = "Get the review forest of a blog",
    description = "Top-level reviews with their replies nested to any depth, oldest first.",
    params(("id" = i32, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Review forest", body = Vec<ReviewNode>),
        (status = 404, description = "Blog not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(blog_id))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(blog_id): Path<i32>,
) -> Result<Json<Vec<ReviewNode>>, AppError> {
    ensure_blog(&state.db, blog_id).await?;

    let rows = review::Entity::find()
        .filter(review::Column::BlogId.eq(blog_id))
        .all(&state.db)
        .await?;

    Ok(Json(build_forest(rows)))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Reviews",
    operation_id = "createReview",
    summary = "Post a review or a reply",
    description = "When `parent_review_id` is set, the parent must be a review of the same blog \
                   and the reply must not exceed the configured thread depth.",
    params(("id" = i32, Path, description = "Blog ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewNode),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Blog not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(blog_id, user_id = auth_user.user_id))]
pub async fn create_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(blog_id): Path<i32>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_review(&payload)?;

    let txn = state.db.begin().await?;

    ensure_blog(&txn, blog_id).await?;

    if let Some(parent_id) = payload.parent_review_id {
        let parent = review::Entity::find_by_id(parent_id)
            .one(&txn)
            .await?
            .filter(|p| p.blog_id == blog_id)
            .ok_or_else(|| {
                AppError::Validation(format!("Review {parent_id} is not a review of this blog"))
            })?;

        let max_depth = state.config.reviews.max_reply_depth;
        if thread_depth(&txn, &parent, max_depth).await? >= max_depth {
            return Err(AppError::Validation(format!(
                "Replies cannot be nested more than {max_depth} levels deep"
            )));
        }
    }

    let created = review::ActiveModel {
        comment: Set(payload.comment.trim().to_string()),
        date: Set(Utc::now()),
        user_id: Set(auth_user.user_id),
        blog_id: Set(blog_id),
        parent_review_id: Set(payload.parent_review_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    blog::Entity::update_many()
        .col_expr(
            blog::Column::ReviewCount,
            Expr::col(blog::Column::ReviewCount).add(1),
        )
        .filter(blog::Column::Id.eq(blog_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(ReviewNode::from(created))))
}

#[utoipa::path(
    delete,
    path = "/{review_id}",
    tag = "Reviews",
    operation_id = "deleteReview",
    summary = "Delete a review",
    description = "Author only. Returns 409 CONFLICT while replies reference the review.",
    params(
        ("id" = i32, Path, description = "Blog ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Review has replies (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(blog_id, review_id, user_id = auth_user.user_id))]
pub async fn delete_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((blog_id, review_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;

    let target = review::Entity::find_by_id(review_id)
        .filter(review::Column::BlogId.eq(blog_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".into()))?;

    if target.user_id != auth_user.user_id && !auth_user.is_admin {
        return Err(AppError::PermissionDenied);
    }

    let replies = review::Entity::find()
        .filter(review::Column::ParentReviewId.eq(review_id))
        .count(&txn)
        .await?;
    if replies > 0 {
        return Err(AppError::Conflict(
            "Cannot delete a review that has replies".into(),
        ));
    }

    review::Entity::delete_by_id(review_id).exec(&txn).await?;

    blog::Entity::update_many()
        .col_expr(
            blog::Column::ReviewCount,
            Expr::col(blog::Column::ReviewCount).sub(1),
        )
        .filter(blog::Column::Id.eq(blog_id))
        .filter(blog::Column::ReviewCount.gt(0))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
