//! # VidTube API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client ───► HTTP (8000) ───► Routes ───► SQLite                       │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                             Cloudinary                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vidtube_api::auth::JwtManager;
use vidtube_api::media::CloudinaryUploader;
use vidtube_api::{server, ApiConfig, AppState};
use vidtube_db::{Database, DbConfig};

const DEFAULT_LOG_FILTER: &str = "vidtube_api=debug,vidtube_db=info,tower_http=info,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    info!("Starting VidTube API server...");

    let config = ApiConfig::load().context("Failed to load configuration")?;
    info!(
        addr = %config.listen_addr(),
        db = %config.database_path.display(),
        cloudinary = config.cloudinary.is_some(),
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await
    .context("Failed to open database")?;

    let jwt = Arc::new(JwtManager::new(
        config.access_token_secret.clone(),
        config.access_token_expiry_secs,
        config.refresh_token_secret.clone(),
        config.refresh_token_expiry_secs,
    ));

    if config.cloudinary.is_none() {
        tracing::warn!("Cloudinary is not configured; uploads will be rejected");
    }
    let uploader = Arc::new(
        CloudinaryUploader::new(config.cloudinary.clone()).context("Failed to build HTTP client")?,
    );

    let state = AppState::new(db, jwt, uploader, config.upload_dir.clone());

    server::run(&config, state).await
}
