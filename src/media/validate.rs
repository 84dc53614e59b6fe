use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TrimError};

/// Confirm `path` is an existing, non-empty, readable regular file.
pub async fn validate_audio_file(path: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => TrimError::Validation(format!("File not found: {}", path.display())),
        _ => TrimError::Validation(format!("Cannot access {}: {e}", path.display())),
    })?;

    if !metadata.is_file() {
        return Err(TrimError::Validation(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }

    if metadata.len() == 0 {
        return Err(TrimError::Validation(format!(
            "File is empty: {}",
            path.display()
        )));
    }

    // Opening for read is the portable readability check.
    tokio::fs::File::open(path).await.map_err(|e| {
        TrimError::Validation(format!("File is not readable: {} ({e})", path.display()))
    })?;

    debug!("Validated {} ({} bytes)", path.display(), metadata.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accepts_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ok.mp3");
        std::fs::write(&file, b"ID3").unwrap();

        assert!(validate_audio_file(&file).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_missing_file() {
        let result = validate_audio_file(Path::new("/nonexistent/track.mp3")).await;
        match result {
            Err(TrimError::Validation(msg)) => assert!(msg.contains("File not found")),
            other => panic!("Expected Validation error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.wav");
        std::fs::write(&file, b"").unwrap();

        let err = validate_audio_file(&file).await.unwrap_err();
        assert!(err.to_string().contains("File is empty"));
    }

    #[tokio::test]
    async fn test_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();

        let err = validate_audio_file(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Path is not a file"));
    }
}
