//! # Domain Types
//!
//! Core domain types used throughout VidTube.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │      Video      │   │   VideoQuery    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  owner_id (FK)  │   │  page, limit    │       │
//! │  │  username       │   │  title          │   │  search         │       │
//! │  │  password_hash  │   │  video_file     │   │  sort_by        │       │
//! │  │  refresh_token  │   │  is_published   │   │  owner_id       │       │
//! │  └────────┬────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   PublicUser    │   │ SessionIdentity │                             │
//! │  │ (no secrets)    │   │ (token claims + │                             │
//! │  │                 │   │  stored refresh)│                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Secrets (`password_hash`, `refresh_token`) never leave the server: every
//! response serializes [`PublicUser`], never [`User`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// User
// =============================================================================

/// A registered user, as stored.
///
/// `Debug` redacts `password_hash` and `refresh_token`.
#[derive(Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Lowercase, unique handle.
    pub username: String,

    /// Lowercase, unique email address.
    pub email: String,

    pub full_name: String,

    /// Cloud URL of the avatar image.
    pub avatar: String,

    /// Cloud URL of the cover image (empty when none was uploaded).
    pub cover_image: String,

    /// Argon2 PHC string.
    pub password_hash: String,

    /// Currently valid refresh token, `None` when no session is active.
    pub refresh_token: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with a fresh id and no active session.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        password_hash: impl Into<String>,
        avatar: impl Into<String>,
        cover_image: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
            avatar: avatar.into(),
            cover_image: cover_image.into(),
            password_hash: password_hash.into(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the user without credential fields.
    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

const REDACTED: &str = "<redacted>";

fn redact_token(token: &Option<String>) -> Option<&'static str> {
    token.as_ref().map(|_| REDACTED)
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("avatar", &self.avatar)
            .field("cover_image", &self.cover_image)
            .field("password_hash", &REDACTED)
            .field("refresh_token", &redact_token(&self.refresh_token))
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// User as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// The slice of a user the session token manager works with.
///
/// Access tokens embed `username`, `email` and `full_name`; the stored
/// `refresh_token` is what a presented refresh token is compared against.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SessionIdentity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("refresh_token", &redact_token(&self.refresh_token))
            .finish()
    }
}

/// Public channel page for a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(flatten)]
    pub user: PublicUser,
    pub video_count: i64,
    pub total_views: i64,
}

// =============================================================================
// Video
// =============================================================================

/// A published or draft video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,

    /// Id of the owning user.
    #[serde(rename = "owner")]
    pub owner_id: String,

    /// Cloud URL of the video file.
    pub video_file: String,

    /// Cloud URL of the thumbnail image.
    pub thumbnail: String,

    pub title: String,
    pub description: String,

    /// Length in seconds, as reported by the media provider.
    pub duration: f64,

    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Creates a new, published video with zero views.
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        video_file: impl Into<String>,
        thumbnail: impl Into<String>,
        duration: f64,
    ) -> Self {
        let now = Utc::now();
        Video {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            video_file: video_file.into(),
            thumbnail: thumbnail.into(),
            title: title.into(),
            description: description.into(),
            duration,
            views: 0,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` may see this video.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.is_published || self.owner_id == user_id
    }
}

/// Partial update for a video. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl VideoUpdate {
    /// True when there is nothing to change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.thumbnail.is_none()
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Column a video listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl SortField {
    /// Parses the client-facing name (`createdAt`, `views`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" | "created_at" => Some(SortField::CreatedAt),
            "views" => Some(SortField::Views),
            "duration" => Some(SortField::Duration),
            "title" => Some(SortField::Title),
            _ => None,
        }
    }

    /// The SQL column this field maps to.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Views => "views",
            SortField::Duration => "duration",
            SortField::Title => "title",
        }
    }

    pub const ALLOWED: [&'static str; 4] = ["createdAt", "views", "duration", "title"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated parameters for listing videos.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    /// Substring matched against title and description.
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    /// Restrict to one owner.
    pub owner_id: Option<String>,
    /// Include unpublished videos (only ever set for the owner's own listing).
    pub include_unpublished: bool,
}

impl VideoQuery {
    /// Number of rows to skip for the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for VideoQuery {
    fn default() -> Self {
        VideoQuery {
            page: 1,
            limit: crate::DEFAULT_PAGE_LIMIT,
            search: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            owner_id: None,
            include_unpublished: false,
        }
    }
}

/// One page of videos plus totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl VideoPage {
    pub fn new(videos: Vec<Video>, query: &VideoQuery, total: i64) -> Self {
        let limit = i64::from(query.limit.max(1));
        VideoPage {
            videos,
            page: query.page,
            limit: query.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_credentials() {
        let mut user = User::new("alice", "alice@example.com", "Alice", "$argon2id$x", "a.png", "");
        user.refresh_token = Some("eyJ.secret.sig".to_string());

        let printed = format!("{user:?}");
        assert!(printed.contains("alice@example.com"));
        assert!(!printed.contains("$argon2id$x"));
        assert!(!printed.contains("eyJ.secret.sig"));

        let identity = SessionIdentity {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            refresh_token: user.refresh_token.clone(),
        };
        let printed = format!("{identity:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("eyJ.secret.sig"));
    }

    #[test]
    fn test_public_user_hides_secrets() {
        let mut user = User::new("alice", "alice@example.com", "Alice", "$argon2id$x", "a.png", "");
        user.refresh_token = Some("secret".to_string());

        let json = serde_json::to_value(user.to_public()).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["fullName"], "Alice");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
    }

    #[test]
    fn test_new_user_has_no_session() {
        let user = User::new("bob", "bob@example.com", "Bob", "hash", "a.png", "");
        assert!(user.refresh_token.is_none());
        assert!(Uuid::parse_str(&user.id).is_ok());
    }

    #[test]
    fn test_unpublished_video_only_visible_to_owner() {
        let mut video = Video::new("owner-1", "t", "d", "v.mp4", "t.png", 12.5);
        assert!(video.is_visible_to("someone-else"));

        video.is_published = false;
        assert!(video.is_visible_to("owner-1"));
        assert!(!video.is_visible_to("someone-else"));
    }

    #[test]
    fn test_video_serializes_owner_key() {
        let video = Video::new("owner-1", "t", "d", "v.mp4", "t.png", 1.0);
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["owner"], "owner-1");
        assert_eq!(json["isPublished"], true);
    }

    #[test]
    fn test_query_offset_and_page_totals() {
        let query = VideoQuery {
            page: 3,
            limit: 10,
            ..VideoQuery::default()
        };
        assert_eq!(query.offset(), 20);

        let page = VideoPage::new(vec![], &query, 21);
        assert_eq!(page.total_pages, 3);

        let page = VideoPage::new(vec![], &query, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(SortField::parse("views"), Some(SortField::Views));
        assert_eq!(SortField::parse("createdAt").unwrap().column(), "created_at");
        assert_eq!(SortField::parse("password_hash"), None);
        assert_eq!(SortOrder::parse("ASC"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }

    #[test]
    fn test_video_update_is_empty() {
        assert!(VideoUpdate::default().is_empty());
        let update = VideoUpdate {
            title: Some("new".to_string()),
            ..VideoUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
