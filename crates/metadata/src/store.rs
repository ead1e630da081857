//! Chapter record store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{ChapterRow, MoveDirection, NewChapter};
use async_trait::async_trait;
use folio_core::chapter::{ChapterStatus, EncodingOutcome};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Chapter record store.
///
/// The store is the only writer of `chapter_number` and `updated_at`.
/// Status transitions are guarded at the SQL level so concurrent
/// writers cannot race a read-then-write.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Insert a new chapter record in the `uploading` state.
    async fn create_chapter(&self, chapter: NewChapter) -> MetadataResult<ChapterRow>;

    /// Fetch a chapter by id.
    async fn get_chapter(&self, chapter_id: Uuid) -> MetadataResult<ChapterRow>;

    /// List all chapters of a book ordered by chapter number.
    async fn list_by_book(&self, book_id: &str) -> MetadataResult<Vec<ChapterRow>>;

    /// Delete a chapter record.
    async fn delete_chapter(&self, chapter_id: Uuid) -> MetadataResult<()>;

    /// Next available chapter number for a book (max + 1, starting at 1).
    async fn next_chapter_number(&self, book_id: &str) -> MetadataResult<i64>;

    /// Update a chapter's display title.
    async fn update_title(&self, chapter_id: Uuid, title: &str) -> MetadataResult<()>;

    /// Swap a chapter's number with its adjacent neighbor.
    ///
    /// Boundary moves (first chapter up, last chapter down) are no-ops.
    /// Returns the chapter's number after the operation. Numbers are
    /// gap-tolerant; deletion never compacts them.
    async fn reorder(
        &self,
        book_id: &str,
        chapter_id: Uuid,
        direction: MoveDirection,
    ) -> MetadataResult<i64>;

    /// Leave the `uploading` state.
    ///
    /// When `next` is `Ready` the source key is promoted to `file_key`
    /// in the same statement (no encoding step configured). Guarded by
    /// `WHERE status = 'uploading'`.
    async fn set_uploaded(&self, chapter_id: Uuid, next: ChapterStatus) -> MetadataResult<()>;

    /// Apply an encoder completion report.
    ///
    /// Single conditional UPDATE guarded by `WHERE status = 'processing'`.
    /// A late or duplicate report affects zero rows and surfaces as
    /// [`MetadataError::StaleTransition`].
    async fn complete_processing(
        &self,
        chapter_id: Uuid,
        outcome: &EncodingOutcome,
    ) -> MetadataResult<()>;

    /// Move a ready or errored chapter back to `processing`.
    ///
    /// Clears `file_key` and `error_reason` so stale output can never
    /// be served while the new encode runs.
    async fn begin_reprocess(&self, chapter_id: Uuid) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Sentinel number used during the reorder swap. Real chapter numbers
/// are always positive.
const REORDER_SENTINEL: i64 = -1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chapters (
    chapter_id      TEXT PRIMARY KEY,
    book_id         TEXT NOT NULL,
    chapter_number  INTEGER NOT NULL,
    title           TEXT NOT NULL,
    file_name       TEXT NOT NULL,
    file_size       INTEGER NOT NULL,
    source_key      TEXT NOT NULL,
    file_key        TEXT,
    status          TEXT NOT NULL,
    duration_sec    REAL,
    bitrate_kbps    INTEGER,
    sample_rate     INTEGER,
    channels        INTEGER,
    format          TEXT,
    error_reason    TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE (book_id, chapter_number)
);

CREATE INDEX IF NOT EXISTS idx_chapters_book ON chapters (book_id, chapter_number);
"#;

/// SQLite-based chapter store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::Config(format!("creating {}: {e}", parent.display())))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> MetadataResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

fn map_insert_error(err: sqlx::Error, chapter: &NewChapter) -> MetadataError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return MetadataError::AlreadyExists(format!(
                "chapter number {} for book {}",
                chapter.chapter_number, chapter.book_id
            ));
        }
    }
    MetadataError::Database(err)
}

#[async_trait]
impl ChapterStore for SqliteStore {
    #[tracing::instrument(skip(self, chapter), fields(chapter_id = %chapter.chapter_id, book_id = %chapter.book_id))]
    async fn create_chapter(&self, chapter: NewChapter) -> MetadataResult<ChapterRow> {
        let now = OffsetDateTime::now_utc();

        sqlx::query(
            "INSERT INTO chapters (chapter_id, book_id, chapter_number, title, file_name, \
             file_size, source_key, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'uploading', ?, ?)",
        )
        .bind(chapter.chapter_id)
        .bind(&chapter.book_id)
        .bind(chapter.chapter_number)
        .bind(&chapter.title)
        .bind(&chapter.file_name)
        .bind(chapter.file_size)
        .bind(&chapter.source_key)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &chapter))?;

        self.get_chapter(chapter.chapter_id).await
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> MetadataResult<ChapterRow> {
        sqlx::query_as::<_, ChapterRow>("SELECT * FROM chapters WHERE chapter_id = ?")
            .bind(chapter_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("chapter {chapter_id}")))
    }

    async fn list_by_book(&self, book_id: &str) -> MetadataResult<Vec<ChapterRow>> {
        let rows = sqlx::query_as::<_, ChapterRow>(
            "SELECT * FROM chapters WHERE book_id = ? ORDER BY chapter_number ASC",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_chapter(&self, chapter_id: Uuid) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM chapters WHERE chapter_id = ?")
            .bind(chapter_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("chapter {chapter_id}")));
        }
        Ok(())
    }

    async fn next_chapter_number(&self, book_id: &str) -> MetadataResult<i64> {
        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(chapter_number), 0) + 1 FROM chapters WHERE book_id = ?",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(next)
    }

    async fn update_title(&self, chapter_id: Uuid, title: &str) -> MetadataResult<()> {
        let result =
            sqlx::query("UPDATE chapters SET title = ?, updated_at = ? WHERE chapter_id = ?")
                .bind(title)
                .bind(OffsetDateTime::now_utc())
                .bind(chapter_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("chapter {chapter_id}")));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(direction = direction.as_str()))]
    async fn reorder(
        &self,
        book_id: &str,
        chapter_id: Uuid,
        direction: MoveDirection,
    ) -> MetadataResult<i64> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT chapter_number FROM chapters WHERE chapter_id = ? AND book_id = ?",
        )
        .bind(chapter_id)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = current
            .ok_or_else(|| MetadataError::NotFound(format!("chapter {chapter_id} in {book_id}")))?;

        let neighbor: Option<(Uuid, i64)> = match direction {
            MoveDirection::Up => {
                sqlx::query_as(
                    "SELECT chapter_id, chapter_number FROM chapters \
                     WHERE book_id = ? AND chapter_number < ? \
                     ORDER BY chapter_number DESC LIMIT 1",
                )
                .bind(book_id)
                .bind(current)
                .fetch_optional(&mut *tx)
                .await?
            }
            MoveDirection::Down => {
                sqlx::query_as(
                    "SELECT chapter_id, chapter_number FROM chapters \
                     WHERE book_id = ? AND chapter_number > ? \
                     ORDER BY chapter_number ASC LIMIT 1",
                )
                .bind(book_id)
                .bind(current)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        // Boundary move: nothing to swap with.
        let Some((neighbor_id, neighbor_number)) = neighbor else {
            tx.rollback().await?;
            return Ok(current);
        };

        let now = OffsetDateTime::now_utc();

        // Three-step swap through a sentinel so the unique index on
        // (book_id, chapter_number) never sees a duplicate.
        sqlx::query("UPDATE chapters SET chapter_number = ?, updated_at = ? WHERE chapter_id = ?")
            .bind(REORDER_SENTINEL)
            .bind(now)
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE chapters SET chapter_number = ?, updated_at = ? WHERE chapter_id = ?")
            .bind(current)
            .bind(now)
            .bind(neighbor_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE chapters SET chapter_number = ?, updated_at = ? WHERE chapter_id = ?")
            .bind(neighbor_number)
            .bind(now)
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(neighbor_number)
    }

    #[tracing::instrument(skip(self), fields(next = next.as_str()))]
    async fn set_uploaded(&self, chapter_id: Uuid, next: ChapterStatus) -> MetadataResult<()> {
        if !ChapterStatus::Uploading.can_transition_to(next) {
            return Err(MetadataError::Constraint(format!(
                "uploading cannot transition to {}",
                next.as_str()
            )));
        }

        let now = OffsetDateTime::now_utc();
        let result = match next {
            ChapterStatus::Ready => {
                // No encoding step: the upload is the playable asset.
                sqlx::query(
                    "UPDATE chapters SET status = 'ready', file_key = source_key, updated_at = ? \
                     WHERE chapter_id = ? AND status = 'uploading'",
                )
                .bind(now)
                .bind(chapter_id)
                .execute(&self.pool)
                .await?
            }
            _ => {
                sqlx::query(
                    "UPDATE chapters SET status = ?, updated_at = ? \
                     WHERE chapter_id = ? AND status = 'uploading'",
                )
                .bind(next.as_str())
                .bind(now)
                .bind(chapter_id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(MetadataError::StaleTransition {
                chapter_id: chapter_id.to_string(),
                expected: "uploading".to_string(),
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, outcome))]
    async fn complete_processing(
        &self,
        chapter_id: Uuid,
        outcome: &EncodingOutcome,
    ) -> MetadataResult<()> {
        let now = OffsetDateTime::now_utc();

        let result = match outcome {
            EncodingOutcome::Success { file_key, media } => {
                sqlx::query(
                    "UPDATE chapters SET status = 'ready', file_key = ?, duration_sec = ?, \
                     bitrate_kbps = ?, sample_rate = ?, channels = ?, format = ?, \
                     error_reason = NULL, updated_at = ? \
                     WHERE chapter_id = ? AND status = 'processing'",
                )
                .bind(file_key)
                .bind(media.duration_sec)
                .bind(media.bitrate_kbps.map(i64::from))
                .bind(media.sample_rate.map(i64::from))
                .bind(media.channels.map(i64::from))
                .bind(&media.format)
                .bind(now)
                .bind(chapter_id)
                .execute(&self.pool)
                .await?
            }
            EncodingOutcome::Failure { error_reason } => {
                sqlx::query(
                    "UPDATE chapters SET status = 'error', error_reason = ?, updated_at = ? \
                     WHERE chapter_id = ? AND status = 'processing'",
                )
                .bind(error_reason)
                .bind(now)
                .bind(chapter_id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(MetadataError::StaleTransition {
                chapter_id: chapter_id.to_string(),
                expected: "processing".to_string(),
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn begin_reprocess(&self, chapter_id: Uuid) -> MetadataResult<()> {
        let result = sqlx::query(
            "UPDATE chapters SET status = 'processing', file_key = NULL, error_reason = NULL, \
             updated_at = ? \
             WHERE chapter_id = ? AND status IN ('ready', 'error')",
        )
        .bind(OffsetDateTime::now_utc())
        .bind(chapter_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::StaleTransition {
                chapter_id: chapter_id.to_string(),
                expected: "ready or error".to_string(),
            });
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
