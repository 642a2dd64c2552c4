use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Profile image assigned at registration until the user uploads one.
pub const DEFAULT_IMAGE_URL: &str = "default";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Normalized (trimmed, lower-cased) email; doubles as the login name.
    #[sea_orm(unique)]
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,

    pub name: String,
    pub surname: String,
    pub image_url: String,
    pub email_confirmed: bool,

    pub access_failed_count: i32,
    pub lockout_end: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub blogs: HasMany<super::blog::Entity>,

    #[sea_orm(has_many)]
    pub reviews: HasMany<super::review::Entity>,

    #[sea_orm(has_many)]
    pub tokens: HasMany<super::user_token::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
