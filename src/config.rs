use crate::batch::RetryPolicy;
use crate::error::{Result, TrimError};
use crate::job::{Bitrate, OutputFormat, SampleRate};
use crate::media::{CandidateResolver, ProbePolicy};
use crate::transcode::{default_rules, ErrorClassifier, ErrorRule};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry knobs for the probe and for batch items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total probe attempts per file (first try included).
    pub probe_attempts: u32,
    pub probe_delay_ms: u64,
    /// Extra attempts for a batch item whose failure looks transient.
    pub batch_retries: u32,
    pub batch_delay_ms: u64,
    /// Substrings that mark a batch failure as transient.
    pub transient_keywords: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            probe_attempts: 2,
            probe_delay_ms: 500,
            batch_retries: 1,
            batch_delay_ms: 1000,
            transient_keywords: vec![
                "temporarily".to_string(),
                "timeout".to_string(),
                "busy".to_string(),
            ],
        }
    }
}

impl RetryConfig {
    pub fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy {
            attempts: self.probe_attempts,
            delay: Duration::from_millis(self.probe_delay_ms),
        }
    }

    pub fn batch_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.batch_retries,
            delay: Duration::from_millis(self.batch_delay_ms),
            transient_keywords: self.transient_keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit FFmpeg binary, tried before any other location.
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit FFprobe binary, tried before any other location.
    pub ffprobe_path: Option<PathBuf>,
    pub default_format: OutputFormat,
    pub default_bitrate: Bitrate,
    pub default_sample_rate: SampleRate,
    /// How many failed batch items are listed individually in summaries.
    pub failure_report_limit: usize,
    pub retry: RetryConfig,
    /// Engine error classification table, first match wins.
    pub error_rules: Vec<ErrorRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            default_format: OutputFormat::default(),
            default_bitrate: Bitrate::default(),
            default_sample_rate: SampleRate::default(),
            failure_report_limit: 5,
            retry: RetryConfig::default(),
            error_rules: default_rules(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match Self::from_toml_str(&contents) {
                    Ok(file_config) => {
                        debug!("Loaded config from {}", config_path.display());
                        config = file_config;
                    }
                    Err(e) => warn!(
                        "Ignoring unreadable config file {}: {}",
                        config_path.display(),
                        e
                    ),
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| TrimError::Config(e.to_string()))
    }

    /// Override fields from `TRACKTRIM_*` environment variables.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("TRACKTRIM_FFMPEG") {
            self.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("TRACKTRIM_FFPROBE") {
            self.ffprobe_path = Some(PathBuf::from(path));
        }
        if let Some(format) = var("TRACKTRIM_DEFAULT_FORMAT") {
            match format.parse() {
                Ok(f) => self.default_format = f,
                Err(e) => warn!("Ignoring TRACKTRIM_DEFAULT_FORMAT: {}", e),
            }
        }
        if let Some(retries) = var("TRACKTRIM_BATCH_RETRIES") {
            match retries.parse::<u32>() {
                Ok(r) => self.retry.batch_retries = r,
                Err(e) => warn!("Ignoring TRACKTRIM_BATCH_RETRIES={:?}: {}", retries, e),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.probe_attempts == 0 {
            return Err(TrimError::Config(
                "retry.probe_attempts must be at least 1".to_string(),
            ));
        }

        if let Some(rule) = self.error_rules.iter().find(|r| r.pattern.is_empty()) {
            return Err(TrimError::Config(format!(
                "error rule for {:?} has an empty pattern",
                rule.kind
            )));
        }

        if self.retry.transient_keywords.iter().any(|k| k.is_empty()) {
            return Err(TrimError::Config(
                "retry.transient_keywords must not contain empty strings".to_string(),
            ));
        }

        Ok(())
    }

    /// Binary search order with configured paths tried first.
    pub fn resolver(&self) -> CandidateResolver {
        let mut resolver = CandidateResolver::for_platform();
        if let Some(ref path) = self.ffmpeg_path {
            resolver = resolver.with_override("ffmpeg", path);
        }
        if let Some(ref path) = self.ffprobe_path {
            resolver = resolver.with_override("ffprobe", path);
        }
        resolver
    }

    pub fn classifier(&self) -> ErrorClassifier {
        ErrorClassifier::new(self.error_rules.clone())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tracktrim").join("config.toml"))
    }
}
