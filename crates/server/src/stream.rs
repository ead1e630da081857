//! Streaming URL issuance.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use folio_core::keys::{generate_key, KeyPrefix};
use folio_metadata::ChapterRow;
use folio_storage::SignedUrl;
use uuid::Uuid;

/// Resolve the storage key a ready chapter should be streamed from.
///
/// Fallback order:
/// 1. The recorded `file_key` (authoritative when present).
/// 2. The conventional media key derived from the display file name,
///    if such an object exists.
/// 3. `{chapter_id}.m4a` for legacy objects stored before keys were
///    recorded.
pub async fn resolve_stream_key(state: &AppState, row: &ChapterRow) -> ApiResult<String> {
    if let Some(file_key) = &row.file_key {
        return Ok(file_key.clone());
    }

    let derived = generate_key(&row.book_id, KeyPrefix::Media, &row.file_name);
    if state.storage.exists(&derived).await? {
        return Ok(derived);
    }

    Ok(format!("{}.m4a", row.chapter_id))
}

/// Issue a time-limited streaming URL for a chapter.
///
/// Only ready chapters are streamable; anything else is reported as
/// not found so the chapter's existence is not leaked through this
/// endpoint.
#[tracing::instrument(skip(state), fields(book_id = %book_id))]
pub async fn issue_stream_url(
    state: &AppState,
    book_id: &str,
    chapter_id: Uuid,
) -> ApiResult<(SignedUrl, ChapterRow)> {
    let row = state.chapters.get_chapter(chapter_id).await?;
    if row.book_id != book_id {
        return Err(ApiError::NotFound(format!("chapter {chapter_id}")));
    }
    if !row.status().map(|s| s.is_ready()).unwrap_or(false) {
        return Err(ApiError::NotFound(format!(
            "chapter {chapter_id} is not ready"
        )));
    }

    let key = resolve_stream_key(state, &row).await?;
    let url = state
        .storage
        .issue_url(&key, state.config.server.stream_ttl())
        .await?;

    tracing::debug!(chapter_id = %chapter_id, key = %key, "Issued streaming URL");
    Ok((url, row))
}
