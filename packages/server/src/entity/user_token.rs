use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const PURPOSE_EMAIL_CONFIRMATION: &str = "email_confirmation";
pub const PURPOSE_PASSWORD_RESET: &str = "password_reset";

/// One-time token issued by email. Only the SHA-256 digest is stored.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_token")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    /// One of `email_confirmation`, `password_reset`.
    pub purpose: String,
    pub token_hash: String,
    pub expires_at: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
