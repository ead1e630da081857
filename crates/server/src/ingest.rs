//! Ingestion orchestration: upload validation, key derivation, record
//! lifecycle, and encoding hand-off.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use bytes::Bytes;
use folio_core::chapter::{ChapterStatus, EncodingOutcome};
use folio_core::keys::{generate_key, sanitize_filename, KeyPrefix};
use folio_metadata::{ChapterRow, MetadataError, NewChapter};
use uuid::Uuid;

/// Attempts to claim a chapter number before giving up. Two concurrent
/// uploads to the same book can race the unique index.
const CREATE_ATTEMPTS: u32 = 3;

/// Request handed to the external encoding pipeline.
///
/// The job itself runs outside this server; the request is logged so
/// the pipeline can pick it up from the event stream.
#[derive(Debug)]
pub struct EncodingRequest {
    pub chapter_id: Uuid,
    pub book_id: String,
    pub source_key: String,
}

impl EncodingRequest {
    fn emit(&self) {
        tracing::info!(
            chapter_id = %self.chapter_id,
            book_id = %self.book_id,
            source_key = %self.source_key,
            "Encoding requested"
        );
    }
}

fn validate_extension(state: &AppState, file_name: &str) -> ApiResult<()> {
    let lower = file_name.to_lowercase();
    let allowed = &state.config.server.allowed_extensions;
    if allowed.iter().any(|ext| lower.ends_with(ext.as_str())) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Only {} files are allowed",
            allowed.join("/")
        )))
    }
}

/// Accept an uploaded chapter file.
///
/// Storage is written before the record is created, so an IO failure
/// leaves no dangling metadata. The record starts in `uploading` and
/// is transitioned in the same call: straight to `ready` when encoding
/// is disabled, to `processing` with an emitted [`EncodingRequest`]
/// otherwise.
#[tracing::instrument(skip(state, data), fields(book_id = %book_id, size = data.len()))]
pub async fn accept_upload(
    state: &AppState,
    book_id: &str,
    chapter_title: Option<&str>,
    file_name: &str,
    data: Bytes,
) -> ApiResult<ChapterRow> {
    if book_id.trim().is_empty() {
        return Err(ApiError::Validation("book_id is required".to_string()));
    }
    if file_name.trim().is_empty() {
        return Err(ApiError::Validation("file name is required".to_string()));
    }
    validate_extension(state, file_name)?;

    if data.len() as u64 > state.config.server.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(
            "File size exceeds limit".to_string(),
        ));
    }
    if data.is_empty() {
        return Err(ApiError::Validation("uploaded file is empty".to_string()));
    }

    let display_name = sanitize_filename(file_name);
    let source_key = generate_key(book_id, KeyPrefix::Uploads, &display_name);
    let title = chapter_title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            display_name
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| display_name.clone())
        });

    let file_size = data.len() as i64;
    state.storage.put(&source_key, data).await?;

    let chapter_id = Uuid::new_v4();
    let mut row = None;
    for attempt in 1..=CREATE_ATTEMPTS {
        let chapter_number = state.chapters.next_chapter_number(book_id).await?;
        match state
            .chapters
            .create_chapter(NewChapter {
                chapter_id,
                book_id: book_id.to_string(),
                chapter_number,
                title: title.clone(),
                file_name: display_name.clone(),
                file_size,
                source_key: source_key.clone(),
            })
            .await
        {
            Ok(created) => {
                row = Some(created);
                break;
            }
            Err(MetadataError::AlreadyExists(_)) if attempt < CREATE_ATTEMPTS => {
                tracing::debug!(book_id, attempt, "Chapter number taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    let row = row.ok_or_else(|| {
        ApiError::Conflict("could not claim a chapter number, retry the upload".to_string())
    })?;

    if state.config.server.encoding_enabled {
        state
            .chapters
            .set_uploaded(chapter_id, ChapterStatus::Processing)
            .await?;
        EncodingRequest {
            chapter_id,
            book_id: row.book_id.clone(),
            source_key,
        }
        .emit();
    } else {
        state
            .chapters
            .set_uploaded(chapter_id, ChapterStatus::Ready)
            .await?;
    }

    let row = state.chapters.get_chapter(chapter_id).await?;
    tracing::info!(
        chapter_id = %chapter_id,
        chapter_number = row.chapter_number,
        status = %row.status,
        "Chapter upload accepted"
    );
    Ok(row)
}

/// Apply an encoder completion report.
///
/// A late or duplicate report is rejected by the conditional update in
/// the store; it is logged here and surfaces as a conflict without
/// touching the committed state.
#[tracing::instrument(skip(state, outcome))]
pub async fn report_encoding(
    state: &AppState,
    chapter_id: Uuid,
    outcome: &EncodingOutcome,
) -> ApiResult<ChapterRow> {
    match state.chapters.complete_processing(chapter_id, outcome).await {
        Ok(()) => {}
        Err(MetadataError::StaleTransition {
            chapter_id,
            expected,
        }) => {
            tracing::warn!(%chapter_id, expected, "Ignoring stale encoding report");
            return Err(MetadataError::StaleTransition {
                chapter_id,
                expected,
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(state.chapters.get_chapter(chapter_id).await?)
}

/// Send a ready or errored chapter back through encoding.
#[tracing::instrument(skip(state))]
pub async fn reprocess(state: &AppState, chapter_id: Uuid) -> ApiResult<ChapterRow> {
    // Fetch first so an unknown chapter is a 404, not a conflict.
    let row = state.chapters.get_chapter(chapter_id).await?;
    state.chapters.begin_reprocess(chapter_id).await?;

    EncodingRequest {
        chapter_id,
        book_id: row.book_id.clone(),
        source_key: row.source_key.clone(),
    }
    .emit();

    Ok(state.chapters.get_chapter(chapter_id).await?)
}

/// Delete a chapter record and its stored objects.
///
/// The record is the source of truth and goes first. Object deletes
/// are best-effort; a failure is logged and the orphaned object is
/// left for a manual sweep.
#[tracing::instrument(skip(state))]
pub async fn delete_chapter(state: &AppState, chapter_id: Uuid) -> ApiResult<()> {
    let row = state.chapters.get_chapter(chapter_id).await?;
    state.chapters.delete_chapter(chapter_id).await?;

    let mut keys = vec![row.source_key.clone()];
    if let Some(file_key) = &row.file_key {
        if file_key != &row.source_key {
            keys.push(file_key.clone());
        }
    }

    for key in keys {
        if let Err(e) = state.storage.delete(&key).await {
            tracing::warn!(
                chapter_id = %chapter_id,
                key = %key,
                error = %e,
                "Failed to delete chapter object, leaving orphan"
            );
        }
    }

    tracing::info!(chapter_id = %chapter_id, book_id = %row.book_id, "Chapter deleted");
    Ok(())
}
