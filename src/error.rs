use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a probe could not produce a usable duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The engine could not read the file on any attempt.
    Unreadable,
    /// The engine answered but reported no format section.
    MissingFormat,
    /// The format section carried no positive duration.
    MissingDuration,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Unreadable => {
                write!(f, "Failed to read audio file (corrupted or unsupported format)")
            }
            ProbeFailure::MissingFormat => write!(f, "Invalid audio file metadata"),
            ProbeFailure::MissingDuration => write!(
                f,
                "Could not determine audio duration - file may be corrupted"
            ),
        }
    }
}

/// Stable classification of an engine encode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeFailure {
    Corrupted,
    PermissionDenied,
    /// The engine binary itself is missing; an installation problem.
    BinaryMissing,
    CodecUnsupported,
    Other,
}

impl TranscodeFailure {
    /// User-facing guidance for this kind of failure.
    pub fn guidance(&self) -> &'static str {
        match self {
            TranscodeFailure::Corrupted => {
                "File appears to be corrupted or in an unsupported format"
            }
            TranscodeFailure::PermissionDenied => "Permission denied - check file access rights",
            TranscodeFailure::BinaryMissing => {
                "FFmpeg binary not found - reinstall FFmpeg or set TRACKTRIM_FFMPEG"
            }
            TranscodeFailure::CodecUnsupported => {
                "Codec error - file format may not be fully supported"
            }
            TranscodeFailure::Other => "Audio processing failed",
        }
    }
}

#[derive(Error, Debug)]
pub enum TrimError {
    #[error("File validation failed: {0}")]
    Validation(String),

    #[error("{kind}: {message}")]
    Probe { kind: ProbeFailure, message: String },

    #[error("Start time must be less than end time (start {start}s, end {end}s)")]
    InvalidRange { start: f64, end: f64 },

    #[error("Output file would overwrite input file. Please choose a different output location.")]
    Overwrite(PathBuf),

    #[error("{binary} binary not found. Attempted paths: {}", format_candidates(.candidates))]
    EngineNotFound {
        binary: String,
        candidates: Vec<PathBuf>,
    },

    #[error("{message}")]
    Transcode {
        kind: TranscodeFailure,
        message: String,
    },

    #[error("No audio files found in {}", .0.display())]
    EmptyBatch(PathBuf),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrimError {
    pub fn probe(kind: ProbeFailure, message: impl Into<String>) -> Self {
        Self::Probe {
            kind,
            message: message.into(),
        }
    }

    pub fn transcode(kind: TranscodeFailure, message: impl Into<String>) -> Self {
        Self::Transcode {
            kind,
            message: message.into(),
        }
    }
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        return "none".to_string();
    }
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, TrimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_kinds_render_distinct_guidance() {
        let unreadable = TrimError::probe(ProbeFailure::Unreadable, "moov atom not found");
        let missing = TrimError::probe(ProbeFailure::MissingDuration, "duration=N/A");

        assert!(unreadable.to_string().contains("corrupted or unsupported"));
        assert!(unreadable.to_string().contains("moov atom not found"));
        assert!(missing.to_string().contains("Could not determine audio duration"));
    }

    #[test]
    fn test_engine_not_found_lists_candidates() {
        let err = TrimError::EngineNotFound {
            binary: "ffmpeg".to_string(),
            candidates: vec![PathBuf::from("/opt/a/ffmpeg"), PathBuf::from("/usr/bin/ffmpeg")],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("ffmpeg binary not found"));
        assert!(msg.contains("/opt/a/ffmpeg, /usr/bin/ffmpeg"));
    }

    #[test]
    fn test_transcode_displays_message_only() {
        let err = TrimError::transcode(TranscodeFailure::Other, "Audio processing failed: boom");
        assert_eq!(err.to_string(), "Audio processing failed: boom");
    }
}
