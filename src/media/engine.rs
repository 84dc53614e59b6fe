use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, TrimError};

use super::resolve::BinaryResolver;

/// Raw failure text reported by the engine, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
    /// The engine binary itself could not be started.
    pub binary_missing: bool,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            binary_missing: false,
        }
    }

    pub fn binary_missing(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            binary_missing: true,
        }
    }
}

/// Container section of a probe report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub format_name: Option<String>,
    /// Seconds, as the decimal string the engine prints.
    #[serde(default)]
    pub duration: Option<String>,
}

/// Metadata returned by a probe call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

impl ProbeReport {
    /// Build a report for a container of the given duration.
    pub fn with_duration(format_name: &str, duration_secs: f64) -> Self {
        Self {
            format: Some(ProbeFormat {
                format_name: Some(format_name.to_string()),
                duration: Some(duration_secs.to_string()),
            }),
        }
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, EngineFailure> {
        serde_json::from_str(json)
            .map_err(|e| EngineFailure::new(format!("Failed to parse probe output: {e}")))
    }
}

/// The external media engine: a metadata probe plus an encode run.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect container metadata without decoding.
    async fn probe(&self, input: &Path) -> std::result::Result<ProbeReport, EngineFailure>;

    /// Run one encode invocation to completion.
    async fn transcode(&self, args: &[String]) -> std::result::Result<(), EngineFailure>;
}

/// FFmpeg/FFprobe run as subprocesses.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both binaries, failing fast if either is missing.
    pub fn locate(resolver: &dyn BinaryResolver) -> Result<Self> {
        let ffmpeg = resolver.resolve("ffmpeg")?;
        let ffprobe = resolver.resolve("ffprobe")?;
        Ok(Self::new(ffmpeg, ffprobe))
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }

    /// Check that both binaries actually run.
    pub async fn check(&self) -> Result<()> {
        for binary in [&self.ffmpeg, &self.ffprobe] {
            let output = Command::new(binary)
                .arg("-version")
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| {
                    warn!("Failed to run {}: {e}", binary.display());
                    TrimError::EngineNotFound {
                        binary: binary.display().to_string(),
                        candidates: vec![binary.clone()],
                    }
                })?;

            if !output.status.success() {
                return Err(TrimError::Config(format!(
                    "{} -version exited with {}",
                    binary.display(),
                    output.status
                )));
            }
        }

        debug!("FFmpeg and FFprobe are available");
        Ok(())
    }
}

fn spawn_failure(binary: &Path, e: std::io::Error) -> EngineFailure {
    let message = format!("Failed to run {}: {e}", binary.display());
    if e.kind() == std::io::ErrorKind::NotFound {
        EngineFailure::binary_missing(message)
    } else {
        EngineFailure::new(message)
    }
}

/// Last meaningful stderr text, or the exit status when stderr is empty.
fn failure_text(stderr: &[u8], status: std::process::ExitStatus) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with {status}")
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, input: &Path) -> std::result::Result<ProbeReport, EngineFailure> {
        debug!("[FFprobe] Probing {} with {}", input.display(), self.ffprobe.display());

        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_failure(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(EngineFailure::new(failure_text(&output.stderr, output.status)));
        }

        ProbeReport::from_json(&String::from_utf8_lossy(&output.stdout))
    }

    async fn transcode(&self, args: &[String]) -> std::result::Result<(), EngineFailure> {
        debug!("FFmpeg command: {} {}", self.ffmpeg.display(), args.join(" "));

        let output = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| spawn_failure(&self.ffmpeg, e))?;

        if !output.status.success() {
            return Err(EngineFailure::new(failure_text(&output.stderr, output.status)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_report_parses_format_section() {
        let json = r#"{
            "format": {
                "filename": "song.mp3",
                "nb_streams": 1,
                "format_name": "mp3",
                "duration": "183.245714",
                "size": "4398172"
            }
        }"#;

        let report = ProbeReport::from_json(json).unwrap();
        let format = report.format.unwrap();
        assert_eq!(format.format_name.as_deref(), Some("mp3"));
        assert_eq!(format.duration.as_deref(), Some("183.245714"));
    }

    #[test]
    fn test_probe_report_without_format() {
        let report = ProbeReport::from_json("{}").unwrap();
        assert!(report.format.is_none());
    }

    #[test]
    fn test_probe_report_rejects_garbage() {
        let err = ProbeReport::from_json("not json").unwrap_err();
        assert!(err.message.contains("Failed to parse probe output"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_binary_reports_no_such_file() {
        let engine = FfmpegEngine::new("/nonexistent/bin/ffmpeg", "/nonexistent/bin/ffprobe");

        let err = engine
            .transcode(&["-version".to_string()])
            .await
            .unwrap_err();
        assert!(err.message.contains("No such file"), "{}", err.message);
        assert!(err.binary_missing);

        let err = engine.probe(Path::new("/tmp/a.mp3")).await.unwrap_err();
        assert!(err.message.contains("/nonexistent/bin/ffprobe"));
    }
}
