use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::{blog, image, review, user};
use crate::error::AppError;
use crate::models::review::{ReviewNode, build_forest};
use crate::utils::upload::{MultipartForm, UploadedFile};

/// Validated multipart input for create / edit.
///
/// Text fields `title` and `body` are required (`Title` / `Body` are also
/// accepted). Every file part is treated as an image.
#[derive(Debug)]
pub struct BlogForm {
    pub title: String,
    pub body: String,
    pub images: Vec<UploadedFile>,
}

impl TryFrom<MultipartForm> for BlogForm {
    type Error = AppError;

    fn try_from(form: MultipartForm) -> Result<Self, Self::Error> {
        let field = |lower: &str, upper: &str| {
            form.text(lower)
                .or_else(|| form.text(upper))
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };
        let title = field("title", "Title");
        let body = field("body", "Body");

        if title.is_empty() || title.chars().count() > 256 {
            return Err(AppError::Validation("Title must be 1-256 characters".into()));
        }
        if body.is_empty() {
            return Err(AppError::Validation("Body must not be empty".into()));
        }

        Ok(BlogForm {
            title,
            body,
            images: form.files,
        })
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageResponse {
    pub id: i32,
    pub image_url: String,
    pub is_active: bool,
}

impl From<image::Model> for ImageResponse {
    fn from(i: image::Model) -> Self {
        Self {
            id: i.id,
            image_url: i.image_url,
            is_active: i.is_active,
        }
    }
}

/// Public summary of a blog's owner.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AuthorResponse {
    pub id: i32,
    pub name: String,
    pub surname: String,
    pub image_url: String,
}

impl From<user::Model> for AuthorResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            surname: u.surname,
            image_url: u.image_url,
        }
    }
}

/// A blog with its images and review forest.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BlogResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Hello world")]
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub like_count: i32,
    pub view_count: i32,
    pub review_count: i32,
    pub user_id: i32,
    /// Owner profile; omitted when not loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorResponse>,
    pub images: Vec<ImageResponse>,
    pub reviews: Vec<ReviewNode>,
}

impl BlogResponse {
    pub fn assemble(
        blog: blog::Model,
        images: Vec<image::Model>,
        reviews: Vec<review::Model>,
        author: Option<user::Model>,
    ) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            body: blog.body,
            created_at: blog.created_at,
            updated_at: blog.updated_at,
            like_count: blog.like_count,
            view_count: blog.view_count,
            review_count: blog.review_count,
            user_id: blog.user_id,
            author: author.map(AuthorResponse::from),
            images: images.into_iter().map(ImageResponse::from).collect(),
            reviews: build_forest(reviews),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LikeResponse {
    #[schema(example = 3)]
    pub like_count: i32,
}
