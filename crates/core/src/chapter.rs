//! Chapter encoding lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding lifecycle state of a chapter.
///
/// The transition table is closed:
///
/// ```text
/// uploading  -> ready | processing
/// processing -> ready | error
/// ready      -> processing   (explicit reprocess only)
/// error      -> processing   (explicit reprocess only)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterStatus {
    /// Source bytes are being received and persisted.
    Uploading,
    /// An encoding job owns the chapter.
    Processing,
    /// Playable; a deliverable object exists.
    Ready,
    /// Encoding failed; source is retained for reprocessing.
    Error,
}

impl ChapterStatus {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "uploading" => Ok(Self::Uploading),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Whether the lifecycle permits moving to `next`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uploading, Self::Ready)
                | (Self::Uploading, Self::Processing)
                | (Self::Processing, Self::Ready)
                | (Self::Processing, Self::Error)
                | (Self::Ready, Self::Processing)
                | (Self::Error, Self::Processing)
        )
    }

    /// Whether the chapter is playable.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether an explicit reprocess request is allowed from this state.
    pub fn can_reprocess(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

impl fmt::Display for ChapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Technical metadata for an encoded chapter.
///
/// Populated from the encoder's completion report. When encoding is
/// disabled the source is served as-is and all fields stay unknown.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration_sec: Option<f64>,
    /// Bitrate in kbit/s.
    pub bitrate_kbps: Option<u32>,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Channel count.
    pub channels: Option<u8>,
    /// Container/codec label (e.g. "m4a").
    pub format: Option<String>,
}

impl MediaInfo {
    /// Metadata for a chapter that skipped encoding.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Terminal report from an encoding job.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum EncodingOutcome {
    /// The job produced a deliverable object.
    Success {
        /// Key of the encoded output.
        file_key: String,
        /// Probed media metadata.
        #[serde(flatten)]
        media: MediaInfo,
    },
    /// The job failed; the chapter keeps its source for retry.
    Failure {
        /// Human-readable failure reason.
        error_reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChapterStatus; 4] = [
        ChapterStatus::Uploading,
        ChapterStatus::Processing,
        ChapterStatus::Ready,
        ChapterStatus::Error,
    ];

    #[test]
    fn test_status_roundtrip() {
        for status in ALL {
            assert_eq!(ChapterStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ChapterStatus::parse("queued").is_err());
    }

    #[test]
    fn test_uploading_transitions() {
        assert!(ChapterStatus::Uploading.can_transition_to(ChapterStatus::Ready));
        assert!(ChapterStatus::Uploading.can_transition_to(ChapterStatus::Processing));
        assert!(!ChapterStatus::Uploading.can_transition_to(ChapterStatus::Error));
        assert!(!ChapterStatus::Uploading.can_transition_to(ChapterStatus::Uploading));
    }

    #[test]
    fn test_processing_transitions() {
        assert!(ChapterStatus::Processing.can_transition_to(ChapterStatus::Ready));
        assert!(ChapterStatus::Processing.can_transition_to(ChapterStatus::Error));
        assert!(!ChapterStatus::Processing.can_transition_to(ChapterStatus::Uploading));
        assert!(!ChapterStatus::Processing.can_transition_to(ChapterStatus::Processing));
    }

    #[test]
    fn test_terminal_states_only_reprocess() {
        for status in [ChapterStatus::Ready, ChapterStatus::Error] {
            assert!(status.can_reprocess());
            assert!(status.can_transition_to(ChapterStatus::Processing));
            assert!(!status.can_transition_to(ChapterStatus::Uploading));
            assert!(!status.can_transition_to(ChapterStatus::Ready));
            assert!(!status.can_transition_to(ChapterStatus::Error));
        }
        assert!(!ChapterStatus::Uploading.can_reprocess());
        assert!(!ChapterStatus::Processing.can_reprocess());
    }

    #[test]
    fn test_outcome_serde_shape() {
        let outcome = EncodingOutcome::Success {
            file_key: "book/b1/media/ch1.m4a".to_string(),
            media: MediaInfo {
                duration_sec: Some(12.5),
                bitrate_kbps: Some(128),
                sample_rate: Some(44100),
                channels: Some(2),
                format: Some("m4a".to_string()),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "success");
        assert_eq!(json["file_key"], "book/b1/media/ch1.m4a");
        assert_eq!(json["duration_sec"], 12.5);

        let failure: EncodingOutcome =
            serde_json::from_str(r#"{"result":"failure","error_reason":"probe failed"}"#).unwrap();
        match failure {
            EncodingOutcome::Failure { error_reason } => {
                assert_eq!(error_reason, "probe failed");
            }
            _ => panic!("expected failure"),
        }
    }
}
