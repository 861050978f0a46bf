//! # Video Repository
//!
//! Database operations for videos and view tracking.
//!
//! ## Listing
//! ```text
//! VideoQuery { search, owner_id, include_unpublished, sort_by, page, limit }
//!      │
//!      ▼
//! WHERE  (is_published = 1 OR include_unpublished)
//!   AND  (owner_id = ? when set)
//!   AND  (title LIKE ? OR description LIKE ? when searching)
//! ORDER BY <whitelisted column> <ASC|DESC>, id
//! LIMIT ? OFFSET ?
//! ```
//!
//! The ORDER BY column comes from `SortField::column`, never from client
//! input, so it is safe to format into the statement.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use vidtube_core::{Video, VideoQuery, VideoUpdate};

/// Repository for video database operations.
#[derive(Debug, Clone)]
pub struct VideoRepository {
    pool: SqlitePool,
}

impl VideoRepository {
    /// Creates a new VideoRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VideoRepository { pool }
    }

    /// Inserts a new video.
    pub async fn insert(&self, video: &Video) -> DbResult<()> {
        debug!(id = %video.id, owner = %video.owner_id, "Inserting video");

        sqlx::query(
            r#"
            INSERT INTO videos (
                id, owner_id, video_file, thumbnail, title, description,
                duration, views, is_published, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&video.id)
        .bind(&video.owner_id)
        .bind(&video.video_file)
        .bind(&video.thumbnail)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.duration)
        .bind(video.views)
        .bind(video.is_published)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a video by id.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Video>> {
        let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }

    /// Lists one page of videos and the total number of matches.
    pub async fn list(&self, query: &VideoQuery) -> DbResult<(Vec<Video>, i64)> {
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        const FILTER: &str = r#"
            WHERE (is_published = 1 OR ?1 = 1)
              AND (?2 IS NULL OR owner_id = ?2)
              AND (?3 IS NULL OR title LIKE ?3 ESCAPE '\' OR description LIKE ?3 ESCAPE '\')
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM videos {FILTER}"))
            .bind(query.include_unpublished)
            .bind(query.owner_id.as_deref())
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT * FROM videos {FILTER} ORDER BY {} {}, id ASC LIMIT ?4 OFFSET ?5",
            query.sort_by.column(),
            query.sort_order.sql(),
        );

        let videos = sqlx::query_as::<_, Video>(&sql)
            .bind(query.include_unpublished)
            .bind(query.owner_id.as_deref())
            .bind(pattern.as_deref())
            .bind(i64::from(query.limit))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        debug!(total, returned = videos.len(), page = query.page, "Listed videos");

        Ok((videos, total))
    }

    /// Applies a partial update and returns the updated video.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such video
    pub async fn update(&self, id: &str, update: &VideoUpdate) -> DbResult<Video> {
        debug!(id = %id, "Updating video");

        sqlx::query_as::<_, Video>(
            r#"
            UPDATE videos SET
                title = COALESCE(?2, title),
                description = COALESCE(?3, description),
                thumbnail = COALESCE(?4, thumbnail),
                updated_at = ?5
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.thumbnail.as_deref())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Video", id))
    }

    /// Deletes a video. Watch history rows go with it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting video");

        let result = sqlx::query("DELETE FROM videos WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Video", id));
        }

        Ok(())
    }

    /// Flips `is_published` and returns the updated video.
    pub async fn toggle_published(&self, id: &str) -> DbResult<Video> {
        sqlx::query_as::<_, Video>(
            r#"
            UPDATE videos SET is_published = NOT is_published, updated_at = ?2
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Video", id))
    }

    /// Counts one view and moves the video to the top of the viewer's history.
    ///
    /// Both writes happen in one transaction.
    pub async fn record_view(&self, video_id: &str, user_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE videos SET views = views + 1 WHERE id = ?1")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Video", video_id));
        }

        sqlx::query(
            r#"
            INSERT INTO watch_history (user_id, video_id, watched_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id, video_id) DO UPDATE SET watched_at = excluded.watched_at
            "#,
        )
        .bind(user_id)
        .bind(video_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

/// Escapes LIKE wildcards so search text matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
