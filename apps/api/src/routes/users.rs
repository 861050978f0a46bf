//! User and session routes.
//!
//! | Method | Path                  | Auth |
//! |--------|-----------------------|------|
//! | POST   | `/register`           | no   |
//! | POST   | `/login`              | no   |
//! | POST   | `/refresh-token`      | no   |
//! | POST   | `/logout`             | yes  |
//! | POST   | `/change-password`    | yes  |
//! | GET    | `/current-user`       | yes  |
//! | PATCH  | `/update-account`     | yes  |
//! | PATCH  | `/update-avatar`      | yes  |
//! | PATCH  | `/update-cover-image` | yes  |
//! | GET    | `/c/{username}`       | yes  |
//! | GET    | `/watch-history`      | yes  |

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::HeaderMap,
    middleware,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password};
use crate::cookies::{clear_session_cookies, read_cookie, set_session_cookies, SessionCookies, REFRESH_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::forms::MultipartForm;
use crate::middleware::{verify_jwt, CurrentUser};
use crate::response::ApiResponse;
use crate::server::AppState;
use crate::session::CredentialPair;
use vidtube_core::validation::{
    validate_email, validate_full_name, validate_password, validate_username,
};
use vidtube_core::{ChannelProfile, CoreError, PublicUser, User, ValidationError, Video};

/// Create the users router.
pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/update-avatar", patch(update_avatar))
        .route("/update-cover-image", patch(update_cover_image))
        .route("/c/{username}", get(channel_profile))
        .route("/watch-history", get(watch_history))
        .route_layer(middleware::from_fn_with_state(state, verify_jwt));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .merge(protected)
}

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Tokens as returned by login and refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
    pub access_token: String,
    pub refresh_token: String,
}

fn session_response(
    state: &AppState,
    pair: CredentialPair,
    user: Option<PublicUser>,
    message: &str,
) -> ApiResult<(SessionCookies, ApiResponse<SessionData>)> {
    let cookies = set_session_cookies(
        &pair,
        state.jwt.access_lifetime_secs(),
        state.jwt.refresh_lifetime_secs(),
    )?;

    Ok((
        cookies,
        ApiResponse::ok(
            SessionData {
                user,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            message,
        ),
    ))
}

// =============================================================================
// Registration & Sessions
// =============================================================================

async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let form = MultipartForm::parse(multipart?, &state.upload_dir).await?;
    let result = register_user(&state, &form).await;
    form.cleanup().await;
    result
}

async fn register_user(state: &AppState, form: &MultipartForm) -> ApiResult<ApiResponse<PublicUser>> {
    let username = validate_username(form.text("username").unwrap_or_default())?;
    let email = validate_email(form.text("email").unwrap_or_default())?;
    let full_name = validate_full_name(form.text("fullName").unwrap_or_default())?;
    let password = form.text("password").unwrap_or_default();
    validate_password(password)?;

    let users = state.db.users();
    if users
        .find_by_username_or_email(Some(&username), Some(&email))
        .await?
        .is_some()
    {
        return Err(CoreError::DuplicateUser.into());
    }

    let avatar_path = form
        .file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let avatar = state
        .uploader
        .upload(Some(avatar_path))
        .await?
        .ok_or_else(|| ApiError::bad_request("Avatar is needed"))?;

    let cover_image = state
        .uploader
        .upload(form.file("coverImage"))
        .await?
        .map(|media| media.url)
        .unwrap_or_default();

    let user = User::new(
        username,
        email,
        full_name,
        hash_password(password)?,
        avatar.url,
        cover_image,
    );
    users.insert(&user).await?;

    info!(user_id = %user.id, username = %user.username, "User registered");

    Ok(ApiResponse::created(user.to_public(), "User registered successfully"))
}

fn invalid_login() -> ApiError {
    ApiError::not_found("No valid user found")
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(SessionCookies, ApiResponse<SessionData>)> {
    let Json(req) = body?;

    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("username or email is required"));
    }
    if req.password.is_empty() {
        return Err(ValidationError::required("password").into());
    }

    let user = state
        .db
        .users()
        .find_by_username_or_email(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(invalid_login)?;

    // same answer as an unknown user
    if !verify_password(&req.password, &user.password_hash) {
        warn!(user_id = %user.id, "Login with wrong password");
        return Err(invalid_login());
    }

    let pair = state.sessions.issue(&user.id).await?;

    session_response(&state, pair, Some(user.to_public()), "User logged in successfully")
}

async fn logout(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<(SessionCookies, ApiResponse<Value>)> {
    state.sessions.revoke(&user.id).await?;

    Ok((
        clear_session_cookies()?,
        ApiResponse::ok(json!({}), "User logged out"),
    ))
}

async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(SessionCookies, ApiResponse<SessionData>)> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|req| req.refresh_token)
    };

    let presented = read_cookie(&headers, REFRESH_COOKIE)
        .map(str::to_string)
        .or(from_body);

    let pair = state.sessions.rotate(presented.as_deref()).await?;

    session_response(&state, pair, None, "Access token refreshed")
}

// =============================================================================
// Account
// =============================================================================

async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<Value>> {
    let Json(req) = body?;

    let users = state.db.users();
    let user = users
        .find_by_id(&current.id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(current.id.clone()))?;

    if !verify_password(&req.old_password, &user.password_hash) {
        return Err(ApiError::bad_request("Invalid old password"));
    }
    validate_password(&req.new_password)?;

    users
        .update_password(&user.id, &hash_password(&req.new_password)?)
        .await?;

    info!(user_id = %user.id, "Password changed");
    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

async fn current_user(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<ApiResponse<PublicUser>> {
    Ok(ApiResponse::ok(user, "Current user fetched successfully"))
}

async fn update_account(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    body: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let Json(req) = body?;

    let full_name = validate_full_name(req.full_name.as_deref().unwrap_or_default())?;
    let email = validate_email(req.email.as_deref().unwrap_or_default())?;

    let user = state
        .db
        .users()
        .update_account(&current.id, &full_name, &email)
        .await?;

    Ok(ApiResponse::ok(user.to_public(), "Account details updated successfully"))
}

#[derive(Debug, Clone, Copy)]
enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn field(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "coverImage",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "Avatar",
            ProfileImage::CoverImage => "Cover image",
        }
    }
}

async fn replace_profile_image(
    state: &AppState,
    user_id: &str,
    form: &MultipartForm,
    kind: ProfileImage,
) -> ApiResult<ApiResponse<PublicUser>> {
    let path = form
        .file(kind.field())
        .ok_or_else(|| ApiError::bad_request(format!("{} file is missing", kind.label())))?;
    let media = state
        .uploader
        .upload(Some(path))
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Error while uploading {}", kind.field())))?;

    let users = state.db.users();
    let user = match kind {
        ProfileImage::Avatar => users.update_avatar(user_id, &media.url).await?,
        ProfileImage::CoverImage => users.update_cover_image(user_id, &media.url).await?,
    };

    info!(user_id = %user_id, image = kind.field(), "Profile image replaced");
    Ok(ApiResponse::ok(
        user.to_public(),
        format!("{} updated successfully", kind.label()),
    ))
}

async fn update_avatar(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let form = MultipartForm::parse(multipart?, &state.upload_dir).await?;
    let result = replace_profile_image(&state, &current.id, &form, ProfileImage::Avatar).await;
    form.cleanup().await;
    result
}

async fn update_cover_image(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let form = MultipartForm::parse(multipart?, &state.upload_dir).await?;
    let result = replace_profile_image(&state, &current.id, &form, ProfileImage::CoverImage).await;
    form.cleanup().await;
    result
}

// =============================================================================
// Channel & History
// =============================================================================

async fn channel_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<ApiResponse<ChannelProfile>> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ValidationError::required("username").into());
    }

    let profile = state
        .db
        .users()
        .channel_profile(&username)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

async fn watch_history(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<ApiResponse<Vec<Video>>> {
    let videos = state.db.users().watch_history(&user.id).await?;
    Ok(ApiResponse::ok(videos, "Watch history fetched successfully"))
}
