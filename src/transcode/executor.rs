use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::{Result, TrimError};
use crate::media::{same_location, MediaEngine};
use crate::plan::{EncodePlan, TrimFadePlan};

use super::classify::ErrorClassifier;
use super::JobResult;

/// EBU R128 loudness normalization: -16 LUFS integrated, -1.5 dBTP, 11 LU range.
pub const LOUDNORM_FILTER: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// Seconds rendered with microsecond precision and no trailing zeros.
fn seconds(value: f64) -> String {
    let text = format!("{value:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Ordered audio filters: fade-in, fade-out, then loudness normalization.
pub fn filter_chain(timing: &TrimFadePlan, normalize: bool) -> Vec<String> {
    let mut filters = Vec::new();

    if timing.fade_in > 0.0 {
        filters.push(format!("afade=t=in:st=0:d={}", seconds(timing.fade_in)));
    }

    if timing.fade_out > 0.0 {
        filters.push(format!(
            "afade=t=out:st={}:d={}",
            seconds(timing.fade_out_start()),
            seconds(timing.fade_out)
        ));
    }

    if normalize {
        filters.push(LOUDNORM_FILTER.to_string());
    }

    filters
}

/// Full engine argument vector for one encode.
pub fn build_args(
    input: &Path,
    timing: &TrimFadePlan,
    encode: &EncodePlan,
    normalize: bool,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
    ];

    // Input seek goes before -i so the engine seeks the demuxer, not the decoded stream.
    if let Some(offset) = timing.seek_offset() {
        args.extend(["-ss".to_string(), seconds(offset)]);
    }

    args.extend(["-i".to_string(), input.to_string_lossy().to_string()]);

    if let Some(limit) = timing.duration_limit() {
        args.extend(["-t".to_string(), seconds(limit)]);
    }

    let filters = filter_chain(timing, normalize);
    if !filters.is_empty() {
        args.extend(["-af".to_string(), filters.join(",")]);
    }

    args.extend(encode.codec_args());
    args.push(encode.output_path.to_string_lossy().to_string());

    args
}

/// Runs a single encode through the engine and classifies its failures.
pub struct TranscodeExecutor {
    engine: Arc<dyn MediaEngine>,
    classifier: ErrorClassifier,
}

impl TranscodeExecutor {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            classifier: ErrorClassifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub async fn execute(
        &self,
        input: &Path,
        timing: &TrimFadePlan,
        encode: &EncodePlan,
        normalize: bool,
    ) -> Result<JobResult> {
        // Writing onto the file being read would truncate the source mid-read.
        if same_location(input, &encode.output_path) {
            return Err(TrimError::Overwrite(encode.output_path.clone()));
        }

        if let Some(parent) = encode.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!(
            "Processing: {} -> {}",
            input.display(),
            encode.output_path.display()
        );
        debug!(
            "Plan: start={:.3}s duration={:.3}s fade_in={:.3}s fade_out={:.3}s codec={} bitrate={:?} rate={:?} normalize={}",
            timing.start,
            timing.duration,
            timing.fade_in,
            timing.fade_out,
            encode.codec,
            encode.bitrate_kbps,
            encode.sample_rate_hz,
            normalize
        );

        let args = build_args(input, timing, encode, normalize);

        self.engine.transcode(&args).await.map_err(|failure| {
            error!("[{}] Processing error: {}", self.engine.name(), failure);
            self.classifier.classify(&failure)
        })?;

        Ok(JobResult {
            input_path: input.to_path_buf(),
            output_path: encode.output_path.clone(),
            duration: timing.duration,
        })
    }
}
