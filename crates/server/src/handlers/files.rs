//! Raw object serving with HTTP range support.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::audio::SuccessResponse;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_core::scope::Scope;
use futures::StreamExt;

/// Parsed byte range request. `end` is inclusive, per RFC 9110.
#[derive(Debug, PartialEq, Eq)]
enum RangeRequest {
    Full,
    Segment { start: u64, end: u64 },
}

/// Parse a Range header against the object size.
///
/// Malformed headers fall back to a full response rather than an
/// error; a syntactically valid range that lies outside the object is
/// a 416. Empty bounds default to the object edges, so `bytes=-500`
/// reads from offset 0 through byte 500.
fn parse_range_header(value: &str, size: u64) -> ApiResult<RangeRequest> {
    let Some(spec) = value.strip_prefix("bytes=") else {
        return Ok(RangeRequest::Full);
    };
    // Multi-range requests are not supported, serve the whole object.
    if spec.contains(',') {
        return Ok(RangeRequest::Full);
    }
    let Some((start_str, end_str)) = spec.split_once('-') else {
        return Ok(RangeRequest::Full);
    };

    let start = if start_str.trim().is_empty() {
        0
    } else {
        match start_str.trim().parse::<u64>() {
            Ok(start) => start,
            Err(_) => return Ok(RangeRequest::Full),
        }
    };

    let end = if end_str.trim().is_empty() {
        size.saturating_sub(1)
    } else {
        match end_str.trim().parse::<u64>() {
            Ok(end) => end.min(size.saturating_sub(1)),
            Err(_) => return Ok(RangeRequest::Full),
        }
    };

    if start >= size || start > end {
        return Err(ApiError::RangeNotSatisfiable { size });
    }

    Ok(RangeRequest::Segment { start, end })
}

/// Guess a content type from the key's extension.
fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_lowercase();
    if lower.ends_with(".m4a") || lower.ends_with(".mp4") {
        "audio/mp4"
    } else if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

/// GET /api/v1/files/{key} - Serve a stored object.
///
/// Unauthenticated: this route backs locally issued streaming URLs,
/// which players fetch without credentials. Supports single byte
/// ranges for seeking.
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let meta = state.storage.head(&key).await?;
    let content_type = content_type_for(&key);

    let range = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_range_header(v, meta.size))
        .transpose()?
        .unwrap_or(RangeRequest::Full);

    match range {
        RangeRequest::Full => {
            let stream = state.storage.get_stream(&key).await?;
            let body_stream =
                stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string())));

            Ok((
                StatusCode::OK,
                [
                    (CONTENT_TYPE, content_type.to_string()),
                    (CONTENT_LENGTH, meta.size.to_string()),
                    (ACCEPT_RANGES, "bytes".to_string()),
                ],
                Body::from_stream(body_stream),
            )
                .into_response())
        }
        RangeRequest::Segment { start, end } => {
            // get_range takes an exclusive end.
            let data = state.storage.get_range(&key, start, end + 1).await?;

            Ok((
                StatusCode::PARTIAL_CONTENT,
                [
                    (CONTENT_TYPE, content_type.to_string()),
                    (CONTENT_LENGTH, data.len().to_string()),
                    (CONTENT_RANGE, format!("bytes {start}-{end}/{}", meta.size)),
                    (ACCEPT_RANGES, "bytes".to_string()),
                ],
                Body::from(data),
            )
                .into_response())
        }
    }
}

/// DELETE /api/v1/files/{key} - Remove a raw stored object.
///
/// Requires the admin scope. Deleting a missing key succeeds.
pub async fn delete_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(key): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    user.require_scope(Scope::Admin)?;
    state.storage.delete(&key).await?;
    tracing::info!(key = %key, "Deleted stored object");
    Ok(Json(SuccessResponse { success: true }))
}
