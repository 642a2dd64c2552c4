use std::sync::Arc;

use anyhow::Context;
use tracing::{Level, info};

use blog_server::config::AppConfig;
use blog_server::state::AppState;
use blog_server::{build_router, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database)
        .await
        .context("Failed to initialize database")?;
    let blob_store = common::storage::from_config(&config.storage)
        .await
        .context("Failed to initialize blob storage")?;
    let mailer = common::mail::from_config(&config.mail).context("Failed to initialize mailer")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        db,
        config: Arc::new(config),
        blob_store,
        mailer,
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, build_router(state)).await?;

    Ok(())
}
