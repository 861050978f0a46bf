//! Video routes. Every route requires an access token.
//!
//! | Method | Path                       | Who        |
//! |--------|----------------------------|------------|
//! | GET    | `/`                        | any caller |
//! | POST   | `/`                        | any caller |
//! | GET    | `/{videoId}`               | any caller |
//! | PATCH  | `/{videoId}`               | owner      |
//! | DELETE | `/{videoId}`               | owner      |
//! | PATCH  | `/toggle/publish/{videoId}`| owner      |

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    middleware,
    routing::{get, patch},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::forms::MultipartForm;
use crate::middleware::{verify_jwt, CurrentUser};
use crate::response::ApiResponse;
use crate::server::AppState;
use vidtube_core::validation::{
    validate_description, validate_entity_id, validate_title, validate_video_query, RawVideoQuery,
};
use vidtube_core::{CoreError, Video, VideoPage, VideoUpdate};

/// Create the videos router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_videos).post(publish_video))
        .route(
            "/{video_id}",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/toggle/publish/{video_id}", patch(toggle_publish))
        .route_layer(middleware::from_fn_with_state(state, verify_jwt))
}

/// Query string of `GET /videos`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

/// Loads a video the caller may see.
///
/// Unpublished videos of other users answer 404, as if they did not exist.
async fn visible_video(state: &AppState, video_id: &str, caller_id: &str) -> ApiResult<Video> {
    let video_id = validate_entity_id("videoId", video_id)?;

    let video = state
        .db
        .videos()
        .find_by_id(&video_id)
        .await?
        .filter(|v| v.is_visible_to(caller_id))
        .ok_or_else(|| CoreError::VideoNotFound(video_id.clone()))?;

    Ok(video)
}

/// Loads a video the caller owns.
async fn owned_video(state: &AppState, video_id: &str, caller_id: &str) -> ApiResult<Video> {
    let video = visible_video(state, video_id, caller_id).await?;

    if video.owner_id != caller_id {
        return Err(CoreError::NotOwner { video_id: video.id }.into());
    }

    Ok(video)
}

async fn list_videos(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    params: Result<Query<ListVideosParams>, QueryRejection>,
) -> ApiResult<ApiResponse<VideoPage>> {
    let Query(params) = params?;

    let query = validate_video_query(
        RawVideoQuery {
            page: params.page,
            limit: params.limit,
            query: params.query.as_deref(),
            sort_by: params.sort_by.as_deref(),
            sort_type: params.sort_type.as_deref(),
            user_id: params.user_id.as_deref(),
        },
        &user.id,
    )?;

    let (videos, total) = state.db.videos().list(&query).await?;

    Ok(ApiResponse::ok(
        VideoPage::new(videos, &query, total),
        "Videos fetched successfully",
    ))
}

async fn publish_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<Video>> {
    let form = MultipartForm::parse(multipart?, &state.upload_dir).await?;
    let result = create_video(&state, &user.id, &form).await;
    form.cleanup().await;
    result
}

async fn create_video(
    state: &AppState,
    owner_id: &str,
    form: &MultipartForm,
) -> ApiResult<ApiResponse<Video>> {
    let title = validate_title(form.text("title").unwrap_or_default())?;
    let description = validate_description(form.text("description").unwrap_or_default())?;

    let video_path = form
        .file("videoFile")
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    let thumbnail_path = form
        .file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let video_file = state
        .uploader
        .upload(Some(video_path))
        .await?
        .ok_or_else(|| ApiError::bad_request("Error while uploading video file"))?;
    let thumbnail = state
        .uploader
        .upload(Some(thumbnail_path))
        .await?
        .ok_or_else(|| ApiError::bad_request("Error while uploading thumbnail"))?;

    let video = Video::new(
        owner_id,
        title,
        description,
        video_file.url,
        thumbnail.url,
        video_file.duration.unwrap_or(0.0),
    );
    state.db.videos().insert(&video).await?;

    info!(video_id = %video.id, owner = %owner_id, "Video published");

    Ok(ApiResponse::created(video, "Video published successfully"))
}

async fn get_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<ApiResponse<Video>> {
    let Path(video_id) = path?;
    let mut video = visible_video(&state, &video_id, &user.id).await?;

    state.db.videos().record_view(&video.id, &user.id).await?;
    video.views += 1;

    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

async fn update_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    path: Result<Path<String>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<Video>> {
    let Path(video_id) = path?;
    let form = MultipartForm::parse(multipart?, &state.upload_dir).await?;
    let result = apply_video_update(&state, &video_id, &user.id, &form).await;
    form.cleanup().await;
    result
}

async fn apply_video_update(
    state: &AppState,
    video_id: &str,
    caller_id: &str,
    form: &MultipartForm,
) -> ApiResult<ApiResponse<Video>> {
    let video = owned_video(state, video_id, caller_id).await?;

    let title = form.text("title").map(validate_title).transpose()?;
    let description = form
        .text("description")
        .map(validate_description)
        .transpose()?;
    let thumbnail_path = form.file("thumbnail");

    if title.is_none() && description.is_none() && thumbnail_path.is_none() {
        return Err(ApiError::bad_request(
            "At least one of title, description or thumbnail is required",
        ));
    }

    let thumbnail = state
        .uploader
        .upload(thumbnail_path)
        .await?
        .map(|media| media.url);

    let update = VideoUpdate {
        title,
        description,
        thumbnail,
    };
    let updated = state.db.videos().update(&video.id, &update).await?;

    info!(video_id = %video.id, "Video updated");
    Ok(ApiResponse::ok(updated, "Video updated successfully"))
}

async fn delete_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<ApiResponse<Value>> {
    let Path(video_id) = path?;
    let video = owned_video(&state, &video_id, &user.id).await?;

    state.db.videos().delete(&video.id).await?;

    info!(video_id = %video.id, "Video deleted");
    Ok(ApiResponse::ok(json!({}), "Video deleted successfully"))
}

async fn toggle_publish(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<ApiResponse<Video>> {
    let Path(video_id) = path?;
    let video = owned_video(&state, &video_id, &user.id).await?;

    let video = state.db.videos().toggle_published(&video.id).await?;

    Ok(ApiResponse::ok(video, "Publish status toggled successfully"))
}
