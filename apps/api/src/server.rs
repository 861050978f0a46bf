//! HTTP server assembly.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request                                                                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  TraceLayer ─► CorsLayer ─► DefaultBodyLimit                            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  /api/v1/healthcheck        (public)                                    │
//! │  /api/v1/users/...          (register, login, refresh-token public)     │
//! │  /api/v1/videos/...         (verify_jwt on every route)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level, Span};

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::media::MediaUploader;
use crate::routes;
use crate::session::SessionTokenManager;
use vidtube_db::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub sessions: Arc<SessionTokenManager>,
    pub uploader: Arc<dyn MediaUploader>,
    pub upload_dir: PathBuf,
}

impl AppState {
    /// Wires the session manager to the user table of `db`.
    pub fn new(
        db: Database,
        jwt: Arc<JwtManager>,
        uploader: Arc<dyn MediaUploader>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        let sessions = Arc::new(SessionTokenManager::new(jwt.clone(), Arc::new(db.users())));
        AppState {
            db,
            jwt,
            sessions,
            uploader,
            upload_dir: upload_dir.into(),
        }
    }
}

/// Router-level settings that are not part of [`AppState`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub cors_origin: Option<String>,
    pub body_limit_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            cors_origin: None,
            body_limit_bytes: 100 * 1024 * 1024,
        }
    }
}

impl From<&ApiConfig> for RouterOptions {
    fn from(config: &ApiConfig) -> Self {
        RouterOptions {
            cors_origin: config.cors_origin.clone(),
            body_limit_bytes: config.body_limit_bytes,
        }
    }
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allowed = origin.and_then(|o| match HeaderValue::from_str(o) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(origin = %o, "Ignoring invalid CORS_ORIGIN");
            None
        }
    });

    match allowed {
        // cookies need an explicit origin
        Some(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// Build the router with all middleware and routes.
pub fn build_router(state: AppState, options: &RouterOptions) -> Router {
    routes::create_router(state)
        .layer(DefaultBodyLimit::max(options.body_limit_bytes))
        .layer(cors_layer(options.cors_origin.as_deref()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path() == "/api/v1/healthcheck" {
                        Span::none()
                    } else {
                        use tower_http::trace::MakeSpan;
                        DefaultMakeSpan::new().level(Level::INFO).make_span(req)
                    }
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Binds, serves until a shutdown signal arrives, then closes the pool.
pub async fn run(config: &ApiConfig, state: AppState) -> anyhow::Result<()> {
    let db = state.db.clone();
    let router = build_router(state, &RouterOptions::from(config));

    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
    info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
