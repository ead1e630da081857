//! Shared handler helpers and the health endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use folio_metadata::ChapterRow;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Format a timestamp for API responses.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

/// Chapter representation returned by the API.
#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    pub chapter_id: String,
    pub book_id: String,
    pub chapter_number: i64,
    pub title: String,
    pub file_name: String,
    pub file_size: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ChapterRow> for ChapterResponse {
    fn from(row: ChapterRow) -> Self {
        Self {
            chapter_id: row.chapter_id.to_string(),
            book_id: row.book_id,
            chapter_number: row.chapter_number,
            title: row.title,
            file_name: row.file_name,
            file_size: row.file_size,
            status: row.status,
            duration_sec: row.duration_sec,
            bitrate_kbps: row.bitrate_kbps,
            sample_rate: row.sample_rate,
            channels: row.channels,
            format: row.format,
            error_reason: row.error_reason,
            created_at: format_timestamp(row.created_at),
            updated_at: format_timestamp(row.updated_at),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
}

/// GET /api/v1/health - Service health.
///
/// Intentionally unauthenticated for load balancer probes.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.chapters.health_check().await?;
    state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage.backend_name(),
    }))
}
