//! API routes.
//!
//! | Prefix                 | Module                |
//! |------------------------|-----------------------|
//! | `/api/v1/healthcheck`  | [`health`]            |
//! | `/api/v1/users`        | [`users`]             |
//! | `/api/v1/videos`       | [`videos`]            |

pub mod health;
pub mod users;
pub mod videos;

use axum::{routing::get, Router};

use crate::server::AppState;

/// Create the API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/healthcheck", get(health::healthcheck))
        .nest("/api/v1/users", users::router(state.clone()))
        .nest("/api/v1/videos", videos::router(state.clone()))
        .with_state(state)
}
