//! Access token middleware.
//!
//! Reads the access token from the `access_token` cookie or an
//! `Authorization: Bearer` header, validates it, loads the user, and injects
//! [`CurrentUser`] into request extensions for downstream handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::extract_bearer_token;
use crate::cookies::{read_cookie, ACCESS_COOKIE};
use crate::error::ApiError;
use crate::server::AppState;
use vidtube_core::PublicUser;

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

/// Token from the cookie first, then the `Authorization` header.
fn access_token(request: &Request) -> Option<String> {
    read_cookie(request.headers(), ACCESS_COOKIE)
        .or_else(|| {
            request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(extract_bearer_token)
        })
        .map(str::to_string)
}

/// Rejects requests without a valid access token for an existing user.
pub async fn verify_jwt(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = access_token(&request).ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state.jwt.validate_access_token(&token).map_err(|e| {
        debug!(error = %e, "Access token rejected");
        ApiError::from(e)
    })?;

    let user = state
        .db
        .users()
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    request.extensions_mut().insert(CurrentUser(user.to_public()));

    Ok(next.run(request).await)
}
