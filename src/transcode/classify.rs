//! Best-effort mapping from unstructured engine error text to stable kinds.
//!
//! The substrings live in data (see [`ErrorRule`]) so they can be tuned per
//! engine version from the config file.

use serde::{Deserialize, Serialize};

use crate::error::{TranscodeFailure, TrimError};
use crate::media::EngineFailure;

/// Maps any engine message containing `pattern` to `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRule {
    pub pattern: String,
    pub kind: TranscodeFailure,
}

impl ErrorRule {
    pub fn new(pattern: impl Into<String>, kind: TranscodeFailure) -> Self {
        Self {
            pattern: pattern.into(),
            kind,
        }
    }
}

/// The stock rule table, checked in order.
pub fn default_rules() -> Vec<ErrorRule> {
    vec![
        ErrorRule::new("Invalid data found", TranscodeFailure::Corrupted),
        ErrorRule::new("Permission denied", TranscodeFailure::PermissionDenied),
        ErrorRule::new("ENOENT", TranscodeFailure::BinaryMissing),
        ErrorRule::new("codec", TranscodeFailure::CodecUnsupported),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    rules: Vec<ErrorRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl ErrorClassifier {
    pub fn new(rules: Vec<ErrorRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ErrorRule] {
        &self.rules
    }

    /// First matching kind, or [`TranscodeFailure::Other`].
    pub fn kind_of(&self, message: &str) -> TranscodeFailure {
        self.rules
            .iter()
            .find(|rule| !rule.pattern.is_empty() && message.contains(&rule.pattern))
            .map(|rule| rule.kind)
            .unwrap_or(TranscodeFailure::Other)
    }

    /// Translate a raw engine failure into a [`TrimError::Transcode`].
    ///
    /// Unmatched failures keep the raw engine text so nothing is lost.
    pub fn classify(&self, failure: &EngineFailure) -> TrimError {
        let kind = if failure.binary_missing {
            TranscodeFailure::BinaryMissing
        } else {
            self.kind_of(&failure.message)
        };
        let message = match kind {
            TranscodeFailure::Other => {
                format!("{}: {}", kind.guidance(), failure.message)
            }
            TranscodeFailure::BinaryMissing => {
                format!("{} ({})", kind.guidance(), failure.message)
            }
            _ => kind.guidance().to_string(),
        };
        TrimError::transcode(kind, message)
    }
}
