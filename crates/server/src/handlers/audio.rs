//! Chapter upload and management endpoints.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, ChapterResponse};
use crate::state::AppState;
use crate::{ingest, stream};
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use folio_core::chapter::ChapterStatus;
use folio_core::scope::Scope;
use folio_metadata::MoveDirection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query parameters for the upload endpoint.
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub book_id: String,
    pub chapter_title: Option<String>,
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub chapter_id: String,
    pub chapter_number: i64,
    pub title: String,
    pub status: String,
}

/// POST /api/v1/files/upload/audio - Accept a chapter audio upload.
///
/// Multipart with a single `file` field. Requires the upload scope.
pub async fn upload_audio(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    user.require_scope(Scope::Upload)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation("file field is missing a filename".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read file field: {e}")))?;

        let row = ingest::accept_upload(
            &state,
            &params.book_id,
            params.chapter_title.as_deref(),
            &file_name,
            data,
        )
        .await?;

        return Ok(Json(UploadResponse {
            success: true,
            chapter_id: row.chapter_id.to_string(),
            chapter_number: row.chapter_number,
            title: row.title,
            status: row.status,
        }));
    }

    Err(ApiError::Validation(
        "multipart field 'file' is required".to_string(),
    ))
}

/// Query parameters for chapter listing.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

/// GET /api/v1/audio/{book_id}/chapters - List chapters in play order.
pub async fn list_chapters(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(book_id): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<ChapterResponse>>> {
    let filter = params
        .status
        .as_deref()
        .map(ChapterStatus::parse)
        .transpose()?;

    let rows = state.chapters.list_by_book(&book_id).await?;
    let chapters = rows
        .into_iter()
        .filter(|row| filter.map_or(true, |wanted| row.status() == Some(wanted)))
        .map(ChapterResponse::from)
        .collect();

    Ok(Json(chapters))
}

async fn get_book_chapter(
    state: &AppState,
    book_id: &str,
    chapter_id: Uuid,
) -> ApiResult<folio_metadata::ChapterRow> {
    let row = state.chapters.get_chapter(chapter_id).await?;
    if row.book_id != book_id {
        return Err(ApiError::NotFound(format!("chapter {chapter_id}")));
    }
    Ok(row)
}

/// GET /api/v1/audio/{book_id}/chapters/{chapter_id} - Fetch one chapter.
pub async fn get_chapter(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((book_id, chapter_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<ChapterResponse>> {
    let row = get_book_chapter(&state, &book_id, chapter_id).await?;
    Ok(Json(row.into()))
}

/// Chapter update request: rename and/or adjacent reorder.
#[derive(Debug, Deserialize)]
pub struct UpdateChapterRequest {
    pub title: Option<String>,
    #[serde(rename = "move")]
    pub move_direction: Option<String>,
}

/// PUT /api/v1/audio/{book_id}/chapters/{chapter_id} - Rename or reorder.
///
/// Requires the editor scope. Reorder swaps with the adjacent chapter;
/// moves past either end are no-ops.
pub async fn update_chapter(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((book_id, chapter_id)): Path<(String, Uuid)>,
    Json(request): Json<UpdateChapterRequest>,
) -> ApiResult<Json<ChapterResponse>> {
    user.require_scope(Scope::Editor)?;

    if request.title.is_none() && request.move_direction.is_none() {
        return Err(ApiError::Validation(
            "nothing to update: provide 'title' and/or 'move'".to_string(),
        ));
    }

    get_book_chapter(&state, &book_id, chapter_id).await?;

    if let Some(title) = &request.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::Validation("title must not be empty".to_string()));
        }
        state.chapters.update_title(chapter_id, title).await?;
    }

    if let Some(raw) = &request.move_direction {
        let direction = MoveDirection::parse(raw).ok_or_else(|| {
            ApiError::Validation(format!("move must be \"up\" or \"down\", got {raw:?}"))
        })?;
        state.chapters.reorder(&book_id, chapter_id, direction).await?;
    }

    let row = state.chapters.get_chapter(chapter_id).await?;
    Ok(Json(row.into()))
}

/// Generic success response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// DELETE /api/v1/audio/{book_id}/chapters/{chapter_id} - Delete a chapter.
///
/// Requires the editor scope. The record goes first; object deletes
/// are best-effort.
pub async fn delete_chapter(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((book_id, chapter_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<SuccessResponse>> {
    user.require_scope(Scope::Editor)?;
    get_book_chapter(&state, &book_id, chapter_id).await?;
    ingest::delete_chapter(&state, chapter_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Streaming URL response.
#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub streaming_url: String,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// GET /api/v1/audio/{book_id}/chapters/{chapter_id}/stream - Issue a
/// time-limited streaming URL for a ready chapter.
pub async fn stream_chapter(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((book_id, chapter_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<StreamResponse>> {
    let (url, row) = stream::issue_stream_url(&state, &book_id, chapter_id).await?;

    Ok(Json(StreamResponse {
        streaming_url: url.url,
        expires_at: format_timestamp(url.expires_at),
        duration: row.duration_sec,
    }))
}

/// POST /api/v1/audio/{book_id}/chapters/{chapter_id}/reprocess -
/// Re-run encoding for a ready or errored chapter.
///
/// Requires the admin scope. Clears the deliverable key so stale
/// output can never be served while the new encode runs.
pub async fn reprocess_chapter(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((book_id, chapter_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<ChapterResponse>> {
    user.require_scope(Scope::Admin)?;
    get_book_chapter(&state, &book_id, chapter_id).await?;
    let row = ingest::reprocess(&state, chapter_id).await?;
    Ok(Json(row.into()))
}
