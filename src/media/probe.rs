use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{ProbeFailure, Result, TrimError};

use super::engine::{EngineFailure, MediaEngine, ProbeReport};

/// Fixed-attempt retry for probe calls. Not exponential: a probe either hits a
/// transient engine-startup race or a permanent format error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_millis(500),
        }
    }
}

/// Validated probe outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub duration_secs: f64,
    pub format_name: Option<String>,
}

impl ProbeResult {
    /// Check a raw report for a format section and a positive duration.
    pub fn from_report(report: ProbeReport) -> Result<Self> {
        let format = report.format.ok_or_else(|| {
            TrimError::probe(ProbeFailure::MissingFormat, "no format section in probe output")
        })?;

        let duration_secs = match format.duration.as_deref().map(str::trim) {
            Some(raw) => raw.parse::<f64>().map_err(|_| {
                TrimError::probe(
                    ProbeFailure::MissingDuration,
                    format!("unparseable duration '{raw}'"),
                )
            })?,
            None => {
                return Err(TrimError::probe(
                    ProbeFailure::MissingDuration,
                    "no duration reported",
                ))
            }
        };

        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(TrimError::probe(
                ProbeFailure::MissingDuration,
                format!("reported duration {duration_secs}s"),
            ));
        }

        Ok(Self {
            duration_secs,
            format_name: format.format_name,
        })
    }
}

/// Probe `input` and return its validated duration.
///
/// Engine failures are retried per `policy`; malformed metadata is not,
/// since a second probe of the same file would read the same metadata.
pub async fn probe_duration(
    engine: &dyn MediaEngine,
    input: &Path,
    policy: ProbePolicy,
) -> Result<ProbeResult> {
    let attempts = policy.attempts.max(1);
    let mut last_failure = EngineFailure::new("probe was not attempted");

    for attempt in 1..=attempts {
        match engine.probe(input).await {
            Ok(report) => {
                let result = ProbeResult::from_report(report)?;
                debug!(
                    "Probed {}: {:.3}s ({})",
                    input.display(),
                    result.duration_secs,
                    result.format_name.as_deref().unwrap_or("unknown format")
                );
                return Ok(result);
            }
            Err(failure) => {
                if attempt < attempts {
                    warn!(
                        "Probe attempt {} of {} failed for {}, retrying: {}",
                        attempt,
                        attempts,
                        input.display(),
                        failure
                    );
                    tokio::time::sleep(policy.delay).await;
                }
                last_failure = failure;
            }
        }
    }

    error!(
        "[{}] Probe failed for {}: {}",
        engine.name(),
        input.display(),
        last_failure
    );
    Err(TrimError::probe(ProbeFailure::Unreadable, last_failure.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted probe answers in order, repeating the last one.
    struct ScriptedProbe {
        answers: Mutex<Vec<std::result::Result<ProbeReport, EngineFailure>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(answers: Vec<std::result::Result<ProbeReport, EngineFailure>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaEngine for ScriptedProbe {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn probe(&self, _input: &Path) -> std::result::Result<ProbeReport, EngineFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0].clone()
            }
        }

        async fn transcode(&self, _args: &[String]) -> std::result::Result<(), EngineFailure> {
            Ok(())
        }
    }

    fn fast() -> ProbePolicy {
        ProbePolicy {
            attempts: 2,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_probe_succeeds_first_time() {
        let engine = ScriptedProbe::new(vec![Ok(ProbeReport::with_duration("mp3", 42.5))]);

        let result = probe_duration(&engine, Path::new("a.mp3"), fast()).await.unwrap();
        assert_eq!(result.duration_secs, 42.5);
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_probe_recovers_on_second_attempt() {
        let engine = ScriptedProbe::new(vec![
            Err(EngineFailure::new("Resource temporarily unavailable")),
            Ok(ProbeReport::with_duration("wav", 3.0)),
        ]);

        let result = probe_duration(&engine, Path::new("a.wav"), fast()).await.unwrap();
        assert_eq!(result.duration_secs, 3.0);
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test]
    async fn test_probe_gives_up_after_two_attempts() {
        let engine = ScriptedProbe::new(vec![Err(EngineFailure::new(
            "Invalid data found when processing input",
        ))]);

        let err = probe_duration(&engine, Path::new("bad.mp3"), fast())
            .await
            .unwrap_err();
        assert_eq!(engine.calls(), 2);
        match err {
            TrimError::Probe { kind, message } => {
                assert_eq!(kind, ProbeFailure::Unreadable);
                assert!(message.contains("Invalid data found"));
            }
            other => panic!("Expected Probe error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_format_is_not_retried() {
        let engine = ScriptedProbe::new(vec![Ok(ProbeReport::default())]);

        let err = probe_duration(&engine, Path::new("a.mp3"), fast())
            .await
            .unwrap_err();
        assert_eq!(engine.calls(), 1);
        assert!(matches!(
            err,
            TrimError::Probe {
                kind: ProbeFailure::MissingFormat,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_or_absent_duration_is_rejected() {
        let zero = ProbeResult::from_report(ProbeReport::with_duration("mp3", 0.0));
        assert!(matches!(
            zero,
            Err(TrimError::Probe {
                kind: ProbeFailure::MissingDuration,
                ..
            })
        ));

        let absent = ProbeResult::from_report(ProbeReport {
            format: Some(Default::default()),
        });
        assert!(matches!(
            absent,
            Err(TrimError::Probe {
                kind: ProbeFailure::MissingDuration,
                ..
            })
        ));
    }
}
