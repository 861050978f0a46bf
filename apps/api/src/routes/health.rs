//! Health check route.

use axum::extract::State;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::server::AppState;

/// 200 when the database answers, 503 otherwise.
pub async fn healthcheck(State(state): State<AppState>) -> ApiResult<ApiResponse<Value>> {
    if !state.db.health_check().await {
        return Err(ApiError::service_unavailable("Database unavailable"));
    }

    Ok(ApiResponse::ok(
        json!({ "status": "OK", "version": env!("CARGO_PKG_VERSION") }),
        "Health check passed",
    ))
}
