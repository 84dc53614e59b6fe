//! Job descriptors and the request/response shapes exchanged with callers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::batch::BatchItemResult;
use crate::error::{Result, TrimError};
use crate::pipeline::JobResult;

/// Requested output container, or `same` to keep the output path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Same,
    Mp3,
    Wav,
    Flac,
    M4a,
    Aac,
    Ogg,
    Wma,
    Mp4,
}

impl OutputFormat {
    /// Extension to rewrite the output path with, `None` for `same`.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Same => None,
            OutputFormat::Mp3 => Some("mp3"),
            OutputFormat::Wav => Some("wav"),
            OutputFormat::Flac => Some("flac"),
            OutputFormat::M4a => Some("m4a"),
            OutputFormat::Aac => Some("aac"),
            OutputFormat::Ogg => Some("ogg"),
            OutputFormat::Wma => Some("wma"),
            OutputFormat::Mp4 => Some("mp4"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension().unwrap_or("same"))
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "same" => Ok(OutputFormat::Same),
            "mp3" => Ok(OutputFormat::Mp3),
            "wav" => Ok(OutputFormat::Wav),
            "flac" => Ok(OutputFormat::Flac),
            "m4a" => Ok(OutputFormat::M4a),
            "aac" => Ok(OutputFormat::Aac),
            "ogg" => Ok(OutputFormat::Ogg),
            "wma" => Ok(OutputFormat::Wma),
            "mp4" => Ok(OutputFormat::Mp4),
            _ => Err(format!(
                "Unknown format: {}. Use 'same', 'mp3', 'wav', 'flac', 'm4a', 'aac', 'ogg', 'wma' or 'mp4'",
                s
            )),
        }
    }
}

/// Selector values arrive either as JSON numbers or as strings like "auto" / "192".
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Number(u32),
    Text(String),
}

/// Audio bitrate selector: `auto` or an explicit kbps value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSelector", into = "String")]
pub enum Bitrate {
    #[default]
    Auto,
    Kbps(u32),
}

impl Bitrate {
    pub fn explicit(&self) -> Option<u32> {
        match self {
            Bitrate::Auto => None,
            Bitrate::Kbps(kbps) => Some(*kbps),
        }
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bitrate::Auto => write!(f, "auto"),
            Bitrate::Kbps(kbps) => write!(f, "{}", kbps),
        }
    }
}

impl FromStr for Bitrate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        if value == "auto" {
            return Ok(Bitrate::Auto);
        }
        let digits = value.trim_end_matches("kbps").trim_end_matches('k');
        match digits.parse::<u32>() {
            Ok(kbps) if kbps > 0 => Ok(Bitrate::Kbps(kbps)),
            _ => Err(format!(
                "Invalid bitrate: {}. Use 'auto' or a kbps value like 192",
                s
            )),
        }
    }
}

impl TryFrom<RawSelector> for Bitrate {
    type Error = String;

    fn try_from(raw: RawSelector) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawSelector::Number(0) => Err("Bitrate must be greater than 0".to_string()),
            RawSelector::Number(kbps) => Ok(Bitrate::Kbps(kbps)),
            RawSelector::Text(text) => text.parse(),
        }
    }
}

impl From<Bitrate> for String {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.to_string()
    }
}

/// Sample-rate selector: `auto` or an explicit rate in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSelector", into = "String")]
pub enum SampleRate {
    #[default]
    Auto,
    Hz(u32),
}

impl SampleRate {
    pub fn explicit(&self) -> Option<u32> {
        match self {
            SampleRate::Auto => None,
            SampleRate::Hz(hz) => Some(*hz),
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleRate::Auto => write!(f, "auto"),
            SampleRate::Hz(hz) => write!(f, "{}", hz),
        }
    }
}

impl FromStr for SampleRate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        if value == "auto" {
            return Ok(SampleRate::Auto);
        }
        match value.trim_end_matches("hz").parse::<u32>() {
            Ok(hz) if hz > 0 => Ok(SampleRate::Hz(hz)),
            _ => Err(format!(
                "Invalid sample rate: {}. Use 'auto' or a rate in Hz like 44100",
                s
            )),
        }
    }
}

impl TryFrom<RawSelector> for SampleRate {
    type Error = String;

    fn try_from(raw: RawSelector) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawSelector::Number(0) => Err("Sample rate must be greater than 0".to_string()),
            RawSelector::Number(hz) => Ok(SampleRate::Hz(hz)),
            RawSelector::Text(text) => text.parse(),
        }
    }
}

impl From<SampleRate> for String {
    fn from(rate: SampleRate) -> Self {
        rate.to_string()
    }
}

/// Trim, fade and encode options shared by single jobs and batch runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    /// Seconds from stream start; `None` means the beginning.
    pub start_time: Option<f64>,
    /// Seconds from stream start; `None` means the end of the stream.
    pub end_time: Option<f64>,
    pub fade_in_duration: f64,
    pub fade_out_duration: f64,
    pub normalize_volume: bool,
    pub output_format: OutputFormat,
    pub audio_bitrate: Bitrate,
    pub sample_rate: SampleRate,
}

impl JobOptions {
    /// Reject option values no plan can be computed from.
    pub fn validate(&self) -> Result<()> {
        if let Some(start) = self.start_time {
            if !start.is_finite() || start < 0.0 {
                return Err(TrimError::InvalidJob(format!(
                    "Start time must be a non-negative number of seconds, got {start}"
                )));
            }
        }
        if let Some(end) = self.end_time {
            if !end.is_finite() {
                return Err(TrimError::InvalidJob(format!(
                    "End time must be a number of seconds, got {end}"
                )));
            }
            let start = self.start_time.unwrap_or(0.0);
            if start >= end {
                return Err(TrimError::InvalidRange { start, end });
            }
        }
        for (name, value) in [
            ("Fade-in", self.fade_in_duration),
            ("Fade-out", self.fade_out_duration),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TrimError::InvalidJob(format!(
                    "{name} duration must be zero or positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A single requested transformation of one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(flatten)]
    pub options: JobOptions,
}

impl AudioJob {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            options: JobOptions::default(),
        }
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the trim bounds in seconds.
    pub fn with_range(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.options.start_time = start;
        self.options.end_time = end;
        self
    }

    /// Set fade-in and fade-out durations in seconds.
    pub fn with_fades(mut self, fade_in: f64, fade_out: f64) -> Self {
        self.options.fade_in_duration = fade_in;
        self.options.fade_out_duration = fade_out;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.options.normalize_volume = normalize;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.options.output_format = format;
        self
    }

    pub fn with_bitrate(mut self, bitrate: Bitrate) -> Self {
        self.options.audio_bitrate = bitrate;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: SampleRate) -> Self {
        self.options.sample_rate = sample_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_path.as_os_str().is_empty() || self.output_path.as_os_str().is_empty() {
            return Err(TrimError::InvalidJob(
                "Both an input and an output path are required".to_string(),
            ));
        }
        self.options.validate()
    }
}

/// A directory-wide run: every recognized file in `input_dir` is processed into `output_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub filename_prefix: String,
    #[serde(default)]
    pub filename_suffix: String,
    #[serde(flatten)]
    pub options: JobOptions,
}

impl BatchJob {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            filename_prefix: String::new(),
            filename_suffix: String::new(),
            options: JobOptions::default(),
        }
    }

    pub fn with_affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self.filename_suffix = suffix.into();
        self
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.options.validate()
    }
}

/// Any request accepted on the JSON boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JobRequest {
    Batch(BatchJob),
    Single(AudioJob),
}

/// Response to a single job request.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<JobResult>> for JobResponse {
    fn from(outcome: Result<JobResult>) -> Self {
        match outcome {
            Ok(result) => Self {
                success: true,
                result: Some(result),
                error: None,
            },
            Err(e) => Self {
                success: false,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Response to a batch request. Per-file failures still yield `success: true`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<BatchItemResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Vec<BatchItemResult>>> for BatchResponse {
    fn from(outcome: Result<Vec<BatchItemResult>>) -> Self {
        match outcome {
            Ok(results) => Self {
                success: true,
                results: Some(results),
                error: None,
            },
            Err(e) => Self {
                success: false,
                results: None,
                error: Some(e.to_string()),
            },
        }
    }
}
