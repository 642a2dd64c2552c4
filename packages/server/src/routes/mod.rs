use axum::routing::{post, put};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn api_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/account", account_routes(config))
        .nest("/blog", blog_routes(config))
}

fn account_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let plain = OpenApiRouter::new()
        .routes(routes!(handlers::account::list_users))
        .routes(routes!(handlers::account::register))
        .routes(routes!(handlers::account::login))
        .routes(routes!(handlers::account::confirm_email))
        .routes(routes!(handlers::account::logout))
        .routes(routes!(handlers::account::me))
        .routes(routes!(handlers::account::forgot_password))
        .routes(routes!(handlers::account::reset_password))
        .routes(routes!(
            handlers::account::get_user,
            handlers::account::delete_user
        ));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::account::upload_profile_image))
        .layer(handlers::account::profile_image_body_limit(&config.storage));

    plain.merge(upload)
}

fn blog_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::blog::list_blogs))
        .route("/", post(handlers::blog::create_blog))
        .routes(routes!(handlers::blog::create_blog))
        .routes(routes!(
            handlers::blog::get_blog,
            handlers::blog::delete_blog
        ))
        .route("/{id}", put(handlers::blog::edit_blog))
        .routes(routes!(handlers::blog::edit_blog))
        .routes(routes!(handlers::blog::like_blog))
        .nest("/{id}/reviews", review_routes())
        .layer(handlers::blog::blog_body_limit(&config.storage))
}

fn review_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::review::list_reviews,
            handlers::review::create_review
        ))
        .routes(routes!(handlers::review::delete_review))
}

/// Raw blob upload and listing, served outside `/api` at `/blog/azureblob`.
pub fn blob_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::blob::list_blobs,
            handlers::blob::upload_files
        ))
        .layer(handlers::blog::blog_body_limit(&config.storage))
}

/// Public reads of stored blobs, served at `/blobs/{name}`.
pub fn public_blob_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::blob::get_blob))
}
