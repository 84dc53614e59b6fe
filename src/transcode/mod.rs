pub mod classify;
pub mod executor;

pub use classify::{default_rules, ErrorClassifier, ErrorRule};
pub use executor::{build_args, filter_chain, TranscodeExecutor, LOUDNORM_FILTER};

use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one successful encode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub input_path: PathBuf,
    /// Final output path, after any extension rewrite.
    pub output_path: PathBuf,
    /// Length of the produced clip in seconds.
    pub duration: f64,
}
