//! Router-level tests: real SQLite (in memory), real JWTs, stubbed uploads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use vidtube_api::auth::JwtManager;
use vidtube_api::media::{MediaError, MediaUploader, UploadedMedia};
use vidtube_api::{build_router, AppState, RouterOptions};
use vidtube_db::{Database, DbConfig};

const BOUNDARY: &str = "vidtube-test-boundary";

/// Pretends every upload succeeded; videos are 42 seconds long.
struct StubUploader;

#[async_trait]
impl MediaUploader for StubUploader {
    async fn upload_file(&self, local_path: &Path) -> Result<UploadedMedia, MediaError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(UploadedMedia {
            url: format!("https://cdn.test/{name}"),
            public_id: name,
            duration: Some(42.0),
        })
    }
}

struct TestApp {
    router: Router,
    db: Database,
    upload_dir: PathBuf,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let jwt = Arc::new(JwtManager::new("access-secret", 3600, "refresh-secret", 86400));
        let upload_dir = std::env::temp_dir().join(format!("vidtube-test-{}", uuid::Uuid::new_v4()));
        let state = AppState::new(db.clone(), jwt, Arc::new(StubUploader), upload_dir.clone());

        TestApp {
            router: build_router(state, &RouterOptions::default()),
            db,
            upload_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<String>, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, cookies, body)
    }

    async fn register(&self, username: &str) -> (StatusCode, Value) {
        let (content_type, body) = multipart(
            &[
                ("username", username),
                ("email", &format!("{username}@example.com")),
                ("fullName", "Test User"),
                ("password", "password123"),
            ],
            &[("avatar", "me.png", b"png")],
        );
        let request = Request::post("/api/v1/users/register")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    /// Registers and logs in; returns `(access_token, refresh_token)`.
    async fn login(&self, username: &str) -> (String, String) {
        self.register(username).await;
        let (status, _, body) = self
            .send(json_request(
                "POST",
                "/api/v1/users/login",
                json!({ "username": username, "password": "password123" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    async fn publish(&self, access: &str, title: &str) -> Value {
        let (content_type, body) = multipart(
            &[("title", title), ("description", "a test video")],
            &[
                ("videoFile", "clip.mp4", b"mp4"),
                ("thumbnail", "thumb.png", b"png"),
            ],
        );
        let request = Request::post("/api/v1/videos")
            .header(header::CONTENT_TYPE, content_type)
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::from(body))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    fn staged_files(&self) -> usize {
        std::fs::read_dir(&self.upload_dir)
            .map(|dir| dir.count())
            .unwrap_or(0)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, access: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap()
}

fn refresh_with_cookie(refresh: &str) -> Request<Body> {
    Request::post("/api/v1/users/refresh-token")
        .header(header::COOKIE, format!("refresh_token={refresh}"))
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn healthcheck_uses_success_envelope() {
    let app = TestApp::new().await;

    let request = Request::get("/api/v1/healthcheck").body(Body::empty()).unwrap();
    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "OK");
}

// =============================================================================
// Registration & Login
// =============================================================================

#[tokio::test]
async fn register_creates_user_without_secrets() {
    let app = TestApp::new().await;

    let (status, body) = app.register("Alice").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"]["avatar"].as_str().unwrap().starts_with("https://cdn.test/"));
    assert_eq!(body["data"]["coverImage"], "");
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("refreshToken").is_none());
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn register_duplicate_is_conflict() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (status, body) = app.register("alice").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"], json!([]));
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn register_without_avatar_is_rejected() {
    let app = TestApp::new().await;
    let (content_type, body) = multipart(
        &[
            ("username", "bob"),
            ("email", "bob@example.com"),
            ("fullName", "Bob"),
            ("password", "password123"),
        ],
        &[],
    );
    let request = Request::post("/api/v1/users/register")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn login_sets_http_only_cookies_and_stores_refresh_token() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (status, cookies, body) = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "email": "ALICE@example.com", "password": "password123" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("Secure")));
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")));

    let refresh = body["data"]["refreshToken"].as_str().unwrap();
    let user = app.db.users().find_by_username("alice").await.unwrap().unwrap();
    assert_eq!(user.refresh_token.as_deref(), Some(refresh));
}

#[tokio::test]
async fn login_failures() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (wrong_status, _, wrong_body) = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "username": "alice", "password": "wrong-password" }),
        ))
        .await;
    let (unknown_status, _, unknown_body) = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "username": "nobody", "password": "password123" }),
        ))
        .await;

    // a wrong password must not reveal that the account exists
    assert_eq!(wrong_status, StatusCode::NOT_FOUND);
    assert_eq!(unknown_status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_body["message"], "No valid user found");
    assert_eq!(wrong_body, unknown_body);

    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "password": "password123" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn refresh_rotates_and_old_token_is_rejected() {
    let app = TestApp::new().await;
    let (_, r1) = app.login("alice").await;

    let (status, cookies, body) = app.send(refresh_with_cookie(&r1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cookies.len(), 2);
    let r2 = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(r1, r2);

    let (status, _, body) = app.send(refresh_with_cookie(&r1)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Refresh token is expired or used");

    // the body form works too
    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/v1/users/refresh-token",
            json!({ "refreshToken": r2 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_or_with_garbage_token() {
    let app = TestApp::new().await;

    let request = Request::post("/api/v1/users/refresh-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized request");

    let (status, _, body) = app.send(refresh_with_cookie("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid refresh token");
}

#[tokio::test]
async fn logout_revokes_session_and_clears_cookies() {
    let app = TestApp::new().await;
    let (access, refresh) = app.login("alice").await;

    let (status, cookies, _) = app
        .send(authed("POST", "/api/v1/users/logout", &access))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

    let user = app.db.users().find_by_username("alice").await.unwrap().unwrap();
    assert!(user.refresh_token.is_none());

    let (status, _, _) = app.send(refresh_with_cookie(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_an_access_token() {
    let app = TestApp::new().await;
    let (access, refresh) = app.login("alice").await;

    let request = Request::get("/api/v1/users/current-user")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a refresh token is not an access token
    let (status, _, _) = app
        .send(authed("GET", "/api/v1/users/current-user", &refresh))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = app
        .send(authed("GET", "/api/v1/users/current-user", &access))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    // cookie works as well as the header
    let request = Request::get("/api/v1/users/current-user")
        .header(header::COOKIE, format!("access_token={access}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Account
// =============================================================================

#[tokio::test]
async fn change_password_then_login_with_new_one() {
    let app = TestApp::new().await;
    let (access, _) = app.login("alice").await;

    let mut request = json_request(
        "POST",
        "/api/v1/users/change-password",
        json!({ "oldPassword": "wrong-password", "newPassword": "new-password-1" }),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut request = json_request(
        "POST",
        "/api/v1/users/change-password",
        json!({ "oldPassword": "password123", "newPassword": "new-password-1" }),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "username": "alice", "password": "new-password-1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn update_account_and_channel_profile() {
    let app = TestApp::new().await;
    let (access, _) = app.login("alice").await;

    let mut request = json_request(
        "PATCH",
        "/api/v1/users/update-account",
        json!({ "fullName": "Alice Liddell", "email": "liddell@example.com" }),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullName"], "Alice Liddell");

    app.publish(&access, "first").await;

    let (status, _, body) = app
        .send(authed("GET", "/api/v1/users/c/alice", &access))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["videoCount"], 1);
    assert_eq!(body["data"]["email"], "liddell@example.com");

    let (status, _, _) = app
        .send(authed("GET", "/api/v1/users/c/nobody", &access))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_avatar_replaces_url() {
    let app = TestApp::new().await;
    let (access, _) = app.login("alice").await;

    let (content_type, body) = multipart(&[], &[("avatar", "new-face.png", b"png")]);
    let request = Request::patch("/api/v1/users/update-avatar")
        .header(header::CONTENT_TYPE, content_type)
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::from(body))
        .unwrap();
    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["avatar"].as_str().unwrap().ends_with("new-face.png"));
    assert_eq!(app.staged_files(), 0);
}

// =============================================================================
// Videos
// =============================================================================

#[tokio::test]
async fn publish_list_and_watch() {
    let app = TestApp::new().await;
    let (alice, _) = app.login("alice").await;
    let (bob, _) = app.login("bob").await;

    let video = app.publish(&alice, "cats").await;
    assert_eq!(video["duration"], 42.0);
    assert_eq!(video["isPublished"], true);
    app.publish(&alice, "dogs").await;

    let (status, _, body) = app
        .send(authed("GET", "/api/v1/videos?query=cat&sortBy=title&sortType=asc", &bob))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["videos"][0]["title"], "cats");

    let id = video["id"].as_str().unwrap();
    let (status, _, body) = app
        .send(authed("GET", &format!("/api/v1/videos/{id}"), &bob))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["views"], 1);

    let (_, _, body) = app
        .send(authed("GET", "/api/v1/users/watch-history", &bob))
        .await;
    assert_eq!(body["data"][0]["id"], id);

    let (status, _, _) = app
        .send(authed("GET", "/api/v1/videos?sortBy=password_hash", &bob))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_owner_can_modify_and_see_drafts() {
    let app = TestApp::new().await;
    let (alice, _) = app.login("alice").await;
    let (bob, _) = app.login("bob").await;

    let video = app.publish(&alice, "cats").await;
    let id = video["id"].as_str().unwrap();

    let (status, _, _) = app
        .send(authed("DELETE", &format!("/api/v1/videos/{id}"), &bob))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send(authed("PATCH", &format!("/api/v1/videos/toggle/publish/{id}"), &alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isPublished"], false);

    let (status, _, _) = app
        .send(authed("GET", &format!("/api/v1/videos/{id}"), &bob))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app
        .send(authed("GET", &format!("/api/v1/videos/{id}"), &alice))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app
        .send(authed("DELETE", &format!("/api/v1/videos/{id}"), &alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.db.videos().find_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_video_requires_a_field() {
    let app = TestApp::new().await;
    let (alice, _) = app.login("alice").await;
    let video = app.publish(&alice, "cats").await;
    let id = video["id"].as_str().unwrap();

    let (content_type, body) = multipart(&[], &[]);
    let request = Request::patch(format!("/api/v1/videos/{id}"))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::AUTHORIZATION, format!("Bearer {alice}"))
        .body(Body::from(body))
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (content_type, body) = multipart(&[("title", "cats, revisited")], &[]);
    let request = Request::patch(format!("/api/v1/videos/{id}"))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::AUTHORIZATION, format!("Bearer {alice}"))
        .body(Body::from(body))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "cats, revisited");
    assert_eq!(body["data"]["description"], "a test video");
}

#[tokio::test]
async fn video_ids_are_accepted_in_any_uuid_spelling() {
    let app = TestApp::new().await;
    let (alice, _) = app.login("alice").await;
    let video = app.publish(&alice, "cats").await;
    let id = video["id"].as_str().unwrap();

    let (status, _, body) = app
        .send(authed("GET", &format!("/api/v1/videos/{}", id.to_uppercase()), &alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let (status, _, _) = app
        .send(authed("GET", "/api/v1/videos/not-a-uuid", &alice))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
