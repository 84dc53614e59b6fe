use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::job::OutputFormat;

/// Extensions picked up by directory scans and batch runs.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "wma", "mp4"];

/// Lower-cased extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Check if a file is a supported audio file based on its extension.
pub fn is_audio_file(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// A recognized file found by [`scan_directory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
    pub name: String,
    /// Upper-cased extension without the dot, e.g. `FLAC`.
    pub ext: String,
}

/// Paths of all recognized audio files directly inside `dir`, sorted by file name.
pub async fn audio_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_audio_file(&path) && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} audio files in {}", files.len(), dir.display());
    Ok(files)
}

/// List recognized audio files in `dir` with their display extension.
pub async fn scan_directory(dir: &Path) -> Result<Vec<ScannedFile>> {
    let files = audio_files_in(dir).await?;
    Ok(files
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().to_string();
            let ext = extension_of(path)?.to_uppercase();
            Some(ScannedFile { name, ext })
        })
        .collect())
}

/// Output path for one batch item: `prefix + stem + suffix + extension` inside `output_dir`.
///
/// With [`OutputFormat::Same`] the input's extension is kept verbatim, including its case.
pub fn batch_output_path(
    output_dir: &Path,
    input: &Path,
    prefix: &str,
    suffix: &str,
    format: OutputFormat,
) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let extension = match format.extension() {
        Some(ext) => ext.to_string(),
        None => input
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_default(),
    };

    let mut name = format!("{}{}{}", prefix.trim(), stem, suffix.trim());
    if !extension.is_empty() {
        name.push('.');
        name.push_str(&extension);
    }
    output_dir.join(name)
}

/// Absolute, symlink-resolved form of `path` for identity comparisons.
///
/// Files that do not exist yet are resolved through their parent directory.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if !parent.as_os_str().is_empty() {
            if let Ok(parent) = std::fs::canonicalize(parent) {
                return parent.join(name);
            }
        }
    }
    lexical_absolute(path)
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Whether two paths name the same file once normalized.
pub fn same_location(a: &Path, b: &Path) -> bool {
    normalize_path(a) == normalize_path(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_audio_formats() {
        assert!(is_audio_file(Path::new("track.mp3")));
        assert!(is_audio_file(Path::new("TRACK.FLAC")));
        assert!(is_audio_file(Path::new("clip.mp4")));
        assert!(is_audio_file(Path::new("old.wma")));
    }

    #[test]
    fn test_rejects_non_audio() {
        assert!(!is_audio_file(Path::new("notes.txt")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("README")));
        assert!(!is_audio_file(Path::new("track.opus")));
    }

    #[test]
    fn test_batch_output_path_same_format_keeps_extension_case() {
        let out = batch_output_path(
            Path::new("/out"),
            Path::new("/in/Song.WAV"),
            " pre_ ",
            "_post ",
            OutputFormat::Same,
        );
        assert_eq!(out, PathBuf::from("/out/pre_Song_post.WAV"));
    }

    #[test]
    fn test_batch_output_path_rewrites_extension() {
        let out = batch_output_path(
            Path::new("/out"),
            Path::new("/in/song.flac"),
            "",
            "_trimmed",
            OutputFormat::Mp3,
        );
        assert_eq!(out, PathBuf::from("/out/song_trimmed.mp3"));
    }

    #[test]
    fn test_same_location_resolves_dot_segments() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.mp3");
        std::fs::write(&file, b"data").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let indirect = dir.path().join("sub").join("..").join("a.mp3");
        assert!(same_location(&file, &indirect));
        assert!(!same_location(&file, &dir.path().join("b.mp3")));
    }

    #[tokio::test]
    async fn test_scan_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.flac", "a.mp3", "notes.txt", "c.Ogg", "cover.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp3")).unwrap();

        let files = scan_directory(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.mp3", "b.flac", "c.Ogg"]);
        assert_eq!(files[2].ext, "OGG");
    }
}
