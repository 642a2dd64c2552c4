use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::*;
use tracing::instrument;

use crate::config::StorageConfig;
use crate::entity::{blog, image, review, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::blog::*;
use crate::state::AppState;
use crate::utils::upload::{self, MAX_FILES_PER_REQUEST, StoredImage};

/// Room for every image part of a create / edit request plus the text fields.
pub fn blog_body_limit(storage: &StorageConfig) -> DefaultBodyLimit {
    DefaultBodyLimit::max(
        (storage.max_upload_size as usize).saturating_mul(MAX_FILES_PER_REQUEST) + 64 * 1024,
    )
}

/// Look up a blog or return 404.
async fn find_blog<C: ConnectionTrait>(db: &C, id: i32) -> Result<blog::Model, AppError> {
    blog::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Blog not found".into()))
}

async fn load_blog_response<C: ConnectionTrait>(
    db: &C,
    blog: blog::Model,
) -> Result<BlogResponse, AppError> {
    let images = image::Entity::find()
        .filter(image::Column::BlogId.eq(blog.id))
        .order_by_asc(image::Column::Id)
        .all(db)
        .await?;
    let reviews = review::Entity::find()
        .filter(review::Column::BlogId.eq(blog.id))
        .all(db)
        .await?;
    let author = user::Entity::find_by_id(blog.user_id).one(db).await?;

    Ok(BlogResponse::assemble(blog, images, reviews, author))
}

async fn insert_images<C: ConnectionTrait>(
    db: &C,
    blog_id: i32,
    stored: &[StoredImage],
) -> Result<(), AppError> {
    let now = Utc::now();
    for s in stored {
        image::ActiveModel {
            image_url: Set(s.url.clone()),
            blob_name: Set(s.blob_name.clone()),
            is_active: Set(true),
            blog_id: Set(blog_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Blogs",
    operation_id = "listBlogs",
    summary = "List all blogs",
    description = "Returns every blog with its images, review forest and author.",
    responses((status = 200, description = "All blogs", body = Vec<BlogResponse>)),
)]
#[instrument(skip(state))]
pub async fn list_blogs(State(state): State<AppState>) -> Result<Json<Vec<BlogResponse>>, AppError> {
    let blogs = blog::Entity::find()
        .order_by_asc(blog::Column::Id)
        .all(&state.db)
        .await?;
    if blogs.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let blog_ids: Vec<i32> = blogs.iter().map(|b| b.id).collect();
    let user_ids: Vec<i32> = blogs.iter().map(|b| b.user_id).collect();

    let mut images: HashMap<i32, Vec<image::Model>> = HashMap::new();
    for img in image::Entity::find()
        .filter(image::Column::BlogId.is_in(blog_ids.clone()))
        .order_by_asc(image::Column::Id)
        .all(&state.db)
        .await?
    {
        images.entry(img.blog_id).or_default().push(img);
    }

    let mut reviews: HashMap<i32, Vec<review::Model>> = HashMap::new();
    for r in review::Entity::find()
        .filter(review::Column::BlogId.is_in(blog_ids))
        .all(&state.db)
        .await?
    {
        reviews.entry(r.blog_id).or_default().push(r);
    }

    let authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let data = blogs
        .into_iter()
        .map(|b| {
            let id = b.id;
            let author = authors.get(&b.user_id).cloned();
            BlogResponse::assemble(
                b,
                images.remove(&id).unwrap_or_default(),
                reviews.remove(&id).unwrap_or_default(),
                author,
            )
        })
        .collect();

    Ok(Json(data))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Blogs",
    operation_id = "getBlog",
    summary = "Get a blog by ID",
    description = "Returns the blog with its images and review forest, and counts one view.",
    params(("id" = i32, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Blog", body = BlogResponse),
        (status = 404, description = "Blog not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<BlogResponse>, AppError> {
    let bumped = blog::Entity::update_many()
        .col_expr(
            blog::Column::ViewCount,
            Expr::col(blog::Column::ViewCount).add(1),
        )
        .filter(blog::Column::Id.eq(id))
        .exec(&state.db)
        .await?;
    if bumped.rows_affected == 0 {
        return Err(AppError::NotFound("Blog not found".into()));
    }

    let blog = find_blog(&state.db, id).await?;
    Ok(Json(load_blog_response(&state.db, blog).await?))
}

/// Insert the blog row and its images; `uploaded` collects blob names written so far.
async fn create_in_txn(
    state: &AppState,
    user_id: i32,
    form: &BlogForm,
    uploaded: &mut Vec<String>,
) -> Result<blog::Model, AppError> {
    let txn = state.db.begin().await?;
    let now = Utc::now();

    let blog = blog::ActiveModel {
        title: Set(form.title.clone()),
        body: Set(form.body.clone()),
        like_count: Set(0),
        view_count: Set(0),
        review_count: Set(0),
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let stored =
        upload::store_images(&*state.blob_store, &state.config.storage, &form.images).await?;
    uploaded.extend(stored.iter().map(|s| s.blob_name.clone()));
    insert_images(&txn, blog.id, &stored).await?;

    txn.commit().await?;
    Ok(blog)
}

#[utoipa::path(
    post,
    path = "/create",
    tag = "Blogs",
    operation_id = "createBlog",
    summary = "Create a blog",
    description = "Multipart form with `title`, `body` and any number of image file parts. \
        Every file is checked against the image allow-list before anything is written; one \
        rejected file rejects the whole request. Also served at `POST /api/blog`.",
    request_body(content_type = "multipart/form-data", description = "title, body and image files"),
    responses(
        (status = 201, description = "Blog created", body = BlogResponse),
        (status = 400, description = "VALIDATION_ERROR or BAD_FILE_TYPE", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn create_blog(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = upload::read_form(&mut multipart, state.config.storage.max_upload_size).await?;
    let form = BlogForm::try_from(form)?;
    upload::check_images(&form.images)?;

    let mut uploaded = Vec::new();
    let blog = match create_in_txn(&state, auth_user.user_id, &form, &mut uploaded).await {
        Ok(blog) => blog,
        Err(e) => {
            upload::discard_blobs(&*state.blob_store, &uploaded).await;
            return Err(e);
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(load_blog_response(&state.db, blog).await?),
    ))
}

/// Update the blog row and swap its image set; returns the replaced images.
async fn edit_in_txn(
    state: &AppState,
    existing: blog::Model,
    form: &BlogForm,
    uploaded: &mut Vec<String>,
) -> Result<(blog::Model, Vec<image::Model>), AppError> {
    let txn = state.db.begin().await?;
    let blog_id = existing.id;

    let mut active: blog::ActiveModel = existing.into();
    active.title = Set(form.title.clone());
    active.body = Set(form.body.clone());
    active.updated_at = Set(Utc::now());
    let blog = active.update(&txn).await?;

    let replaced = image::Entity::find()
        .filter(image::Column::BlogId.eq(blog_id))
        .all(&txn)
        .await?;
    image::Entity::delete_many()
        .filter(image::Column::BlogId.eq(blog_id))
        .exec(&txn)
        .await?;

    let stored =
        upload::store_images(&*state.blob_store, &state.config.storage, &form.images).await?;
    uploaded.extend(stored.iter().map(|s| s.blob_name.clone()));
    insert_images(&txn, blog_id, &stored).await?;

    txn.commit().await?;
    Ok((blog, replaced))
}

#[utoipa::path(
    put,
    path = "/edit/{id}",
    tag = "Blogs",
    operation_id = "editBlog",
    summary = "Edit a blog",
    description = "Owner only. Replaces title, body and the full image set with the uploaded \
        files; no image from the previous set survives. Also served at `PUT /api/blog/{id}`.",
    params(("id" = i32, Path, description = "Blog ID")),
    request_body(content_type = "multipart/form-data", description = "title, body and image files"),
    responses(
        (status = 200, description = "Blog updated", body = BlogResponse),
        (status = 400, description = "VALIDATION_ERROR or BAD_FILE_TYPE", body = ErrorBody),
        (status = 401, description = "Unauthorized or not the owner (TOKEN_MISSING, TOKEN_INVALID, UNAUTHORIZED)", body = ErrorBody),
        (status = 404, description = "Blog not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(id, user_id = auth_user.user_id))]
pub async fn edit_blog(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<BlogResponse>, AppError> {
    let existing = find_blog(&state.db, id).await?;
    if existing.user_id != auth_user.user_id {
        return Err(AppError::Unauthorized(
            "Only the owner can edit this blog".into(),
        ));
    }

    let form = upload::read_form(&mut multipart, state.config.storage.max_upload_size).await?;
    let form = BlogForm::try_from(form)?;
    upload::check_images(&form.images)?;

    let mut uploaded = Vec::new();
    let (blog, replaced) = match edit_in_txn(&state, existing, &form, &mut uploaded).await {
        Ok(done) => done,
        Err(e) => {
            upload::discard_blobs(&*state.blob_store, &uploaded).await;
            return Err(e);
        }
    };

    let old_blobs: Vec<String> = replaced.into_iter().map(|i| i.blob_name).collect();
    upload::discard_blobs(&*state.blob_store, &old_blobs).await;

    Ok(Json(load_blog_response(&state.db, blog).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Blogs",
    operation_id = "deleteBlog",
    summary = "Delete a blog",
    description = "Deletes the blog and its images. Returns 409 CONFLICT while any review \
        references the blog.",
    params(("id" = i32, Path, description = "Blog ID")),
    responses(
        (status = 204, description = "Blog deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Blog not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Blog has reviews (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user_id = auth_user.user_id))]
pub async fn delete_blog(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;

    find_blog(&txn, id).await?;

    let review_count = review::Entity::find()
        .filter(review::Column::BlogId.eq(id))
        .count(&txn)
        .await?;
    if review_count > 0 {
        return Err(AppError::Conflict(
            "Cannot delete a blog that still has reviews".into(),
        ));
    }

    let images = image::Entity::find()
        .filter(image::Column::BlogId.eq(id))
        .all(&txn)
        .await?;
    image::Entity::delete_many()
        .filter(image::Column::BlogId.eq(id))
        .exec(&txn)
        .await?;
    blog::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    let blobs: Vec<String> = images.into_iter().map(|i| i.blob_name).collect();
    upload::discard_blobs(&*state.blob_store, &blobs).await;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/like",
    tag = "Blogs",
    operation_id = "likeBlog",
    summary = "Like a blog",
    params(("id" = i32, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "New like count", body = LikeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Blog not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user_id = auth_user.user_id))]
pub async fn like_blog(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<LikeResponse>, AppError> {
    let res = blog::Entity::update_many()
        .col_expr(
            blog::Column::LikeCount,
            Expr::col(blog::Column::LikeCount).add(1),
        )
        .filter(blog::Column::Id.eq(id))
        .exec(&state.db)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound("Blog not found".into()));
    }

    let blog = find_blog(&state.db, id).await?;
    Ok(Json(LikeResponse {
        like_count: blog.like_count,
    }))
}
