//! # User Repository
//!
//! Database operations for users, including the refresh token column the
//! session token manager reads and writes.
//!
//! ## Refresh Token Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  users.refresh_token                                                    │
//! │                                                                         │
//! │  NULL ──set_refresh_token(Some(r1))──► r1      (login)                  │
//! │  r1   ──swap_refresh_token(r1, r2)───► r2      (rotation)               │
//! │  r1   ──swap_refresh_token(r1, r3)───► r2      (lost race: 0 rows)      │
//! │  r2   ──set_refresh_token(None)──────► NULL    (logout)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the credential column and `updated_at` change on these writes; the
//! rest of the row is never revalidated.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use vidtube_core::{ChannelProfile, SessionIdentity, User, Video};

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Inserts a new user.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username or email already taken
    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(username = %user.username, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, full_name, avatar, cover_image,
                password_hash, refresh_token, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.password_hash)
        .bind(&user.refresh_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a user by id.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets a user by username.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets the first user matching either the username or the email.
    ///
    /// `None` arguments never match, so `(None, None)` returns `Ok(None)`.
    pub async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> DbResult<Option<User>> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE (?1 IS NOT NULL AND username = ?1)
               OR (?2 IS NOT NULL AND email = ?2)
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Updates display name and email.
    ///
    /// ## Returns
    /// * `Ok(User)` - the updated row
    /// * `Err(DbError::NotFound)` - no such user
    /// * `Err(DbError::UniqueViolation)` - email taken by another account
    pub async fn update_account(&self, id: &str, full_name: &str, email: &str) -> DbResult<User> {
        debug!(id = %id, "Updating account details");

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET full_name = ?2, email = ?3, updated_at = ?4
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(email)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Replaces the password hash.
    pub async fn update_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        debug!(id = %id, "Updating password");

        let result = sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Sets the avatar URL and returns the updated user.
    pub async fn update_avatar(&self, id: &str, url: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET avatar = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Sets the cover image URL and returns the updated user.
    pub async fn update_cover_image(&self, id: &str, url: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET cover_image = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))
    }

    // =========================================================================
    // Session Storage
    // =========================================================================

    /// Loads the fields needed to mint tokens and check a refresh token.
    pub async fn find_session_identity(&self, id: &str) -> DbResult<Option<SessionIdentity>> {
        let identity = sqlx::query_as::<_, SessionIdentity>(
            "SELECT id, username, email, full_name, refresh_token FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    /// Overwrites the stored refresh token (`None` clears it).
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such user
    pub async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE users SET refresh_token = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(token)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Replaces the stored refresh token only if it still equals `expected`.
    ///
    /// ## Returns
    /// * `Ok(true)` - swapped
    /// * `Ok(false)` - the stored value changed (or the user is gone)
    pub async fn swap_refresh_token(&self, id: &str, expected: &str, new: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET refresh_token = ?3, updated_at = ?4
            WHERE id = ?1 AND refresh_token = ?2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Channel / History
    // =========================================================================

    /// Builds the public channel page for `username`.
    pub async fn channel_profile(&self, username: &str) -> DbResult<Option<ChannelProfile>> {
        let Some(user) = self.find_by_username(username).await? else {
            return Ok(None);
        };

        let (video_count, total_views): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(views), 0)
            FROM videos
            WHERE owner_id = ?1 AND is_published = 1
            "#,
        )
        .bind(&user.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(ChannelProfile {
            user: user.to_public(),
            video_count,
            total_views,
        }))
    }

    /// Videos the user has watched, most recent first.
    ///
    /// Videos that were unpublished since are hidden unless the user owns them.
    pub async fn watch_history(&self, id: &str) -> DbResult<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>(
            r#"
            SELECT v.*
            FROM watch_history w
            INNER JOIN videos v ON v.id = w.video_id
            WHERE w.user_id = ?1
              AND (v.is_published = 1 OR v.owner_id = ?1)
            ORDER BY w.watched_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> (Database, User) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = User::new("alice", "alice@example.com", "Alice", "hash", "a.png", "");
        db.users().insert(&user).await.unwrap();
        (db, user)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (db, user) = setup().await;
        let repo = db.users();

        let found = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert!(found.refresh_token.is_none());

        let by_email = repo
            .find_by_username_or_email(None, Some("alice@example.com"))
            .await
            .unwrap();
        assert_eq!(by_email.unwrap().id, user.id);

        assert!(repo
            .find_by_username_or_email(None, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let (db, _) = setup().await;
        let dup = User::new("alice", "other@example.com", "Other", "hash", "a.png", "");

        let err = db.users().insert(&dup).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "users.username"));
    }

    #[tokio::test]
    async fn test_refresh_token_set_and_clear() {
        let (db, user) = setup().await;
        let repo = db.users();

        repo.set_refresh_token(&user.id, Some("r1")).await.unwrap();
        let identity = repo.find_session_identity(&user.id).await.unwrap().unwrap();
        assert_eq!(identity.refresh_token.as_deref(), Some("r1"));
        assert_eq!(identity.username, "alice");

        repo.set_refresh_token(&user.id, None).await.unwrap();
        let identity = repo.find_session_identity(&user.id).await.unwrap().unwrap();
        assert!(identity.refresh_token.is_none());

        let err = repo.set_refresh_token("missing", Some("x")).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_swap_refresh_token_is_compare_and_swap() {
        let (db, user) = setup().await;
        let repo = db.users();
        repo.set_refresh_token(&user.id, Some("r1")).await.unwrap();

        assert!(repo.swap_refresh_token(&user.id, "r1", "r2").await.unwrap());
        // r1 is no longer stored, so a second swap from r1 must not win
        assert!(!repo.swap_refresh_token(&user.id, "r1", "r3").await.unwrap());

        let identity = repo.find_session_identity(&user.id).await.unwrap().unwrap();
        assert_eq!(identity.refresh_token.as_deref(), Some("r2"));

        repo.set_refresh_token(&user.id, None).await.unwrap();
        assert!(!repo.swap_refresh_token(&user.id, "r2", "r4").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_account_and_images() {
        let (db, user) = setup().await;
        let repo = db.users();

        let updated = repo
            .update_account(&user.id, "Alice Liddell", "liddell@example.com")
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Alice Liddell");
        assert_eq!(updated.email, "liddell@example.com");

        let updated = repo.update_avatar(&user.id, "new.png").await.unwrap();
        assert_eq!(updated.avatar, "new.png");

        let updated = repo.update_cover_image(&user.id, "cover.png").await.unwrap();
        assert_eq!(updated.cover_image, "cover.png");

        assert!(matches!(
            repo.update_avatar("missing", "x").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_channel_profile_counts_published_videos() {
        let (db, user) = setup().await;

        let mut published = Video::new(&user.id, "one", "d", "v1.mp4", "t1.png", 10.0);
        published.views = 7;
        let mut draft = Video::new(&user.id, "two", "d", "v2.mp4", "t2.png", 5.0);
        draft.is_published = false;
        db.videos().insert(&published).await.unwrap();
        db.videos().insert(&draft).await.unwrap();

        let profile = db.users().channel_profile("alice").await.unwrap().unwrap();
        assert_eq!(profile.video_count, 1);
        assert_eq!(profile.total_views, 7);
        assert_eq!(profile.user.id, user.id);

        assert!(db.users().channel_profile("nobody").await.unwrap().is_none());
    }
}
