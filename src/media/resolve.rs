//! Locating the engine binaries on disk.
//!
//! Resolution is an environment concern: the pipeline only ever sees the
//! resolved path, never the search order that produced it.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{Result, TrimError};

/// One place a binary might live, with a label for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub source: String,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Resolves a binary name (`ffmpeg`, `ffprobe`) to an existing path.
pub trait BinaryResolver: Send + Sync {
    fn resolve(&self, binary: &str) -> Result<PathBuf>;
}

/// Return the first candidate that exists as a file.
pub fn first_existing(binary: &str, candidates: &[Candidate]) -> Result<PathBuf> {
    for candidate in candidates {
        if candidate.path.is_file() {
            info!(
                "[{}] Found at: {} (source: {})",
                binary,
                candidate.path.display(),
                candidate.source
            );
            return Ok(candidate.path.clone());
        }
        debug!(
            "[{}] Not at {} ({})",
            binary,
            candidate.path.display(),
            candidate.source
        );
    }

    error!("[{}] Could not find binary. Attempted paths:", binary);
    for candidate in candidates {
        error!("  - {} ({})", candidate.path.display(), candidate.source);
    }

    Err(TrimError::EngineNotFound {
        binary: binary.to_string(),
        candidates: candidates.iter().map(|c| c.path.clone()).collect(),
    })
}

/// Platform file name for a binary (`ffmpeg.exe` on Windows).
pub fn executable_name(binary: &str) -> String {
    if cfg!(windows) {
        format!("{binary}.exe")
    } else {
        binary.to_string()
    }
}

/// Ordered candidate search: explicit overrides, packaged resource
/// directories, then every directory on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct CandidateResolver {
    overrides: Vec<(String, PathBuf)>,
    resource_dirs: Vec<(PathBuf, String)>,
    search_path: bool,
}

impl CandidateResolver {
    /// An empty resolver; add sources with the `with_*` methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard search for this platform and packaging layout.
    pub fn for_platform() -> Self {
        let mut resolver = Self::new().with_search_path(true);

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            if cfg!(target_os = "macos") {
                resolver = resolver.with_resource_dir(
                    exe_dir.join("..").join("Resources"),
                    "app bundle Resources",
                );
            }
            resolver = resolver
                .with_resource_dir(exe_dir.join("resources"), "packaged resources")
                .with_resource_dir(exe_dir, "next to executable");
        }

        resolver
    }

    /// Pin `binary` to an explicit path, tried before anything else.
    pub fn with_override(mut self, binary: &str, path: impl Into<PathBuf>) -> Self {
        self.overrides.push((binary.to_string(), path.into()));
        self
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>, source: &str) -> Self {
        self.resource_dirs.push((dir.into(), source.to_string()));
        self
    }

    /// Fall back to the directories listed in `PATH`.
    pub fn with_search_path(mut self, enabled: bool) -> Self {
        self.search_path = enabled;
        self
    }

    /// Every location that will be tried for `binary`, in order.
    pub fn candidates(&self, binary: &str) -> Vec<Candidate> {
        let file_name = executable_name(binary);
        let mut candidates = Vec::new();

        for (name, path) in &self.overrides {
            if name == binary {
                candidates.push(Candidate::new(path, "configured path"));
            }
        }

        for (dir, source) in &self.resource_dirs {
            candidates.push(Candidate::new(dir.join(&file_name), source.as_str()));
            if cfg!(target_os = "macos") && binary == "ffprobe" {
                let arch = match std::env::consts::ARCH {
                    "aarch64" => "arm64",
                    _ => "x64",
                };
                candidates.push(Candidate::new(
                    dir.join(format!("{binary}-{arch}")),
                    format!("{source} ({arch})"),
                ));
            }
        }

        if self.search_path {
            if let Some(paths) = std::env::var_os("PATH") {
                for dir in std::env::split_paths(&paths) {
                    candidates.push(Candidate::new(dir.join(&file_name), "PATH"));
                }
            }
        }

        candidates
    }
}

impl BinaryResolver for CandidateResolver {
    fn resolve(&self, binary: &str) -> Result<PathBuf> {
        let candidates = self.candidates(binary);
        if let Some(first) = candidates.first() {
            if first.source == "configured path" && !first.path.is_file() {
                warn!(
                    "[{}] Configured path {} does not exist, searching elsewhere",
                    binary,
                    first.path.display()
                );
            }
        }
        first_existing(binary, &candidates)
    }
}
