use crate::config::Config;
use crate::error::{Result, TrimError};
use crate::job::AudioJob;
use crate::media::{probe_duration, same_location, validate_audio_file, MediaEngine, ProbePolicy, ProbeResult};
use crate::plan::{EncodePlan, TrimFadePlan};
use crate::transcode::{ErrorClassifier, TranscodeExecutor};
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub use crate::transcode::JobResult;

/// A job whose input has been checked and whose plans are fixed.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub job: AudioJob,
    pub probe: ProbeResult,
    pub timing: TrimFadePlan,
    pub encode: EncodePlan,
}

/// Runs single jobs end to end: validate, probe, plan, encode.
pub struct JobRunner {
    engine: Arc<dyn MediaEngine>,
    executor: TranscodeExecutor,
    probe_policy: ProbePolicy,
}

impl JobRunner {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            executor: TranscodeExecutor::new(engine.clone()),
            engine,
            probe_policy: ProbePolicy::default(),
        }
    }

    /// Runner with the probe policy and error rules taken from `config`.
    pub fn from_config(engine: Arc<dyn MediaEngine>, config: &Config) -> Self {
        Self::new(engine)
            .with_probe_policy(config.retry.probe_policy())
            .with_classifier(config.classifier())
    }

    pub fn with_probe_policy(mut self, policy: ProbePolicy) -> Self {
        self.probe_policy = policy;
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.executor = self.executor.with_classifier(classifier);
        self
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    /// Everything up to, but not including, the engine encode.
    pub async fn prepare(&self, job: &AudioJob) -> Result<PreparedJob> {
        job.validate()?;

        if same_location(&job.input_path, &job.output_path) {
            return Err(TrimError::Overwrite(job.output_path.clone()));
        }

        // ═══════════════════════════════════════════════════════════════════════
        // Stage 1: Input validation
        // ═══════════════════════════════════════════════════════════════════════
        validate_audio_file(&job.input_path).await?;

        // ═══════════════════════════════════════════════════════════════════════
        // Stage 2: Probe
        // ═══════════════════════════════════════════════════════════════════════
        let probe = probe_duration(self.engine.as_ref(), &job.input_path, self.probe_policy).await?;

        // ═══════════════════════════════════════════════════════════════════════
        // Stage 3: Plan
        // ═══════════════════════════════════════════════════════════════════════
        let options = &job.options;
        let timing = TrimFadePlan::compute(
            probe.duration_secs,
            options.start_time,
            options.end_time,
            options.fade_in_duration,
            options.fade_out_duration,
        )?;
        let encode = EncodePlan::resolve(
            &job.output_path,
            options.output_format,
            options.audio_bitrate,
            options.sample_rate,
        );

        debug!(
            "Prepared {}: {:.3}s of {:.3}s into {}",
            job.input_path.display(),
            timing.duration,
            probe.duration_secs,
            encode.output_path.display()
        );

        Ok(PreparedJob {
            job: job.clone(),
            probe,
            timing,
            encode,
        })
    }

    pub async fn execute(&self, prepared: &PreparedJob) -> Result<JobResult> {
        self.executor
            .execute(
                &prepared.job.input_path,
                &prepared.timing,
                &prepared.encode,
                prepared.job.options.normalize_volume,
            )
            .await
    }

    pub async fn run(&self, job: &AudioJob) -> Result<JobResult> {
        let prepared = self.prepare(job).await?;
        let result = self.execute(&prepared).await?;
        info!(
            "Wrote {} ({:.2}s)",
            result.output_path.display(),
            result.duration
        );
        Ok(result)
    }
}

/// Print a summary of one finished job.
pub fn print_summary(result: &JobResult, elapsed: Duration) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      {}", style("Trim Complete").green().bold());
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Input:      {}", result.input_path.display());
    println!("  Output:     {}", result.output_path.display());
    println!("  Duration:   {:.2}s audio", result.duration);
    println!("  Elapsed:    {:.2}s", elapsed.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeFailure;
    use crate::job::{OutputFormat, SampleRate};
    use crate::media::{EngineFailure, ProbeReport};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEngine {
        duration: Option<f64>,
        transcodes: AtomicUsize,
    }

    impl FixedEngine {
        fn with_duration(duration: f64) -> Self {
            Self {
                duration: Some(duration),
                transcodes: AtomicUsize::new(0),
            }
        }

        fn without_duration() -> Self {
            Self {
                duration: None,
                transcodes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn probe(&self, _input: &Path) -> std::result::Result<ProbeReport, EngineFailure> {
            Ok(match self.duration {
                Some(secs) => ProbeReport::with_duration("wav", secs),
                None => ProbeReport::default(),
            })
        }

        async fn transcode(&self, _args: &[String]) -> std::result::Result<(), EngineFailure> {
            self.transcodes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn runner(engine: Arc<FixedEngine>) -> JobRunner {
        JobRunner::new(engine).with_probe_policy(ProbePolicy {
            attempts: 2,
            delay: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_prepare_builds_plans() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let job = AudioJob::new(&input, dir.path().join("cut.mp3"))
            .with_range(Some(10.0), None)
            .with_fades(2.0, 2.0)
            .with_format(OutputFormat::Wav);

        let prepared = runner(Arc::new(FixedEngine::with_duration(40.0)))
            .prepare(&job)
            .await
            .unwrap();

        assert_eq!(prepared.timing.duration, 30.0);
        assert_eq!(prepared.encode.output_path, dir.path().join("cut.wav"));
        assert_eq!(prepared.encode.sample_rate_hz, Some(44_100));
    }

    #[tokio::test]
    async fn test_same_input_and_output_is_rejected_before_probe() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.mp3");
        std::fs::write(&input, b"ID3").unwrap();

        let engine = Arc::new(FixedEngine::with_duration(10.0));
        let err = runner(engine.clone())
            .run(&AudioJob::new(&input, &input))
            .await
            .unwrap_err();

        assert!(matches!(err, TrimError::Overwrite(_)));
        assert_eq!(engine.transcodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_format_rewrite_onto_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let job = AudioJob::new(&input, dir.path().join("song.mp3"))
            .with_format(OutputFormat::Wav)
            .with_sample_rate(SampleRate::Auto);

        let engine = Arc::new(FixedEngine::with_duration(10.0));
        let err = runner(engine.clone()).run(&job).await.unwrap_err();

        assert!(matches!(err, TrimError::Overwrite(_)));
        assert_eq!(engine.transcodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_duration_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let err = runner(Arc::new(FixedEngine::without_duration()))
            .run(&AudioJob::new(&input, dir.path().join("out.wav")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TrimError::Probe {
                kind: ProbeFailure::MissingFormat,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_run_reports_clip_duration() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.flac");
        std::fs::write(&input, b"fLaC").unwrap();

        let engine = Arc::new(FixedEngine::with_duration(60.0));
        let result = runner(engine.clone())
            .run(&AudioJob::new(&input, dir.path().join("out").join("song.flac")).with_range(Some(5.0), Some(15.0)))
            .await
            .unwrap();

        assert_eq!(result.duration, 10.0);
        assert_eq!(result.input_path, input);
        assert_eq!(engine.transcodes.load(Ordering::SeqCst), 1);
    }
}
