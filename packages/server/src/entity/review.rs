use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A comment on a blog, optionally replying to another review of the same blog.
///
/// Only the parent id is stored; child lists are built on read
/// (see `models::review::build_forest`).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "review")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub comment: String,
    pub date: DateTimeUtc,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub blog_id: i32,
    #[sea_orm(belongs_to, from = "blog_id", to = "id")]
    pub blog: HasOne<super::blog::Entity>,

    /// NULL for top-level reviews.
    pub parent_review_id: Option<i32>,
    #[sea_orm(
        self_ref,
        relation_enum = "ParentReview",
        relation_reverse = "Replies",
        from = "parent_review_id",
        to = "id"
    )]
    pub parent_review: HasOne<Entity>,

    #[sea_orm(self_ref, relation_enum = "Replies", relation_reverse = "ParentReview")]
    pub replies: HasMany<Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
