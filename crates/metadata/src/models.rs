//! Database models mapping to the metadata schema.

use folio_core::chapter::ChapterStatus;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Chapter record.
///
/// `status` is stored as TEXT and validated at the boundary via
/// [`ChapterRow::status`]; `chapter_number` carries a per-book unique
/// index and is the only ordering authority.
#[derive(Debug, Clone, FromRow)]
pub struct ChapterRow {
    pub chapter_id: Uuid,
    pub book_id: String,
    pub chapter_number: i64,
    pub title: String,
    /// Sanitized display name of the uploaded file.
    pub file_name: String,
    pub file_size: i64,
    /// Key of the original upload, immutable after creation.
    pub source_key: String,
    /// Key of the encoded output. NULL while processing.
    pub file_key: Option<String>,
    pub status: String,
    pub duration_sec: Option<f64>,
    pub bitrate_kbps: Option<i64>,
    pub sample_rate: Option<i64>,
    pub channels: Option<i64>,
    pub format: Option<String>,
    pub error_reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ChapterRow {
    /// Parse the stored status column into the typed state machine.
    ///
    /// Only guarded SQL transitions write this column, so an unknown
    /// value means outside interference and maps to `None`.
    pub fn status(&self) -> Option<ChapterStatus> {
        ChapterStatus::parse(&self.status).ok()
    }
}

/// Parameters for creating a new chapter record.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub chapter_id: Uuid,
    pub book_id: String,
    pub chapter_number: i64,
    pub title: String,
    pub file_name: String,
    pub file_size: i64,
    pub source_key: String,
}

/// Direction for an adjacent-swap reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}
