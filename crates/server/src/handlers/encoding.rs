//! Encoding pipeline callback endpoint.

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;
use crate::handlers::common::ChapterResponse;
use crate::ingest;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use folio_core::chapter::EncodingOutcome;
use folio_core::scope::Scope;
use uuid::Uuid;

/// POST /api/v1/encoding/{chapter_id}/complete - Encoder completion report.
///
/// Body is the outcome JSON: `{"result":"success","file_key":...}` or
/// `{"result":"failure","error_reason":...}`. Requires the admin
/// scope. A report for a chapter that is no longer processing is a
/// conflict and leaves the record untouched.
pub async fn complete_encoding(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(chapter_id): Path<Uuid>,
    Json(outcome): Json<EncodingOutcome>,
) -> ApiResult<Json<ChapterResponse>> {
    user.require_scope(Scope::Admin)?;
    let row = ingest::report_encoding(&state, chapter_id, &outcome).await?;
    Ok(Json(row.into()))
}
