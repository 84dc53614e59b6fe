use crate::config::Config;
use crate::error::{Result, TrimError};
use crate::job::{AudioJob, BatchJob};
use crate::media::{audio_files_in, batch_output_path, same_location, MediaEngine};
use crate::pipeline::{JobResult, JobRunner};
use console::style;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Recorded for batch items whose derived name lands on their own input.
pub const BATCH_OVERWRITE_MESSAGE: &str =
    "Output file would overwrite input file. Please change the prefix/suffix.";

/// Emitted once per processed file, after that file resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub file: String,
    pub percent: u8,
}

impl BatchProgress {
    pub fn new(current: usize, total: usize, file: impl Into<String>) -> Self {
        // Rounded up: 1 of 3 reports 34.
        let percent = if total == 0 {
            100
        } else {
            (current * 100).div_ceil(total).min(100) as u8
        };
        Self {
            current,
            total,
            file: file.into(),
            percent,
        }
    }
}

/// Outcome of one file in a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Clip length in seconds, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl BatchItemResult {
    fn succeeded(result: JobResult) -> Self {
        Self {
            input_path: result.input_path,
            output_path: result.output_path,
            success: true,
            error: None,
            duration: Some(result.duration),
        }
    }

    fn failed(input_path: &Path, output_path: &Path, error: impl Into<String>) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            success: false,
            error: Some(error.into()),
            duration: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

/// Where a single batch file is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    /// Validating, probing and planning.
    Preparing,
    Encoding,
    Succeeded,
    Failed,
}

impl FileState {
    /// `Failed -> Preparing` is the retry edge; `Succeeded` is terminal.
    pub fn can_advance_to(self, next: FileState) -> bool {
        use FileState::*;
        matches!(
            (self, next),
            (Pending, Preparing)
                | (Pending, Failed)
                | (Preparing, Encoding)
                | (Preparing, Failed)
                | (Encoding, Succeeded)
                | (Encoding, Failed)
                | (Failed, Preparing)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Succeeded | FileState::Failed)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Pending => "pending",
            FileState::Preparing => "preparing",
            FileState::Encoding => "encoding",
            FileState::Succeeded => "succeeded",
            FileState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

struct FileTracker {
    name: String,
    state: FileState,
}

impl FileTracker {
    fn new(name: String) -> Self {
        Self {
            name,
            state: FileState::Pending,
        }
    }

    fn advance(&mut self, next: FileState) {
        if self.state.can_advance_to(next) {
            debug!("{}: {} -> {}", self.name, self.state, next);
        } else {
            warn!("{}: unexpected transition {} -> {}", self.name, self.state, next);
        }
        self.state = next;
    }
}

/// Retry rule for batch items: a fixed number of extra attempts, only for
/// failures whose message contains a transient keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    pub transient_keywords: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(1),
            transient_keywords: vec![
                "temporarily".to_string(),
                "timeout".to_string(),
                "busy".to_string(),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn is_transient(&self, message: &str) -> bool {
        self.transient_keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && message.contains(keyword.as_str()))
    }
}

/// Everything a finished batch run produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One entry per recognized input file, in processing order.
    pub results: Vec<BatchItemResult>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// `name: error` for the first `limit` failures, then a count of the rest.
    pub fn failure_summary(&self, limit: usize) -> Vec<String> {
        let failures: Vec<&BatchItemResult> = self.results.iter().filter(|r| !r.success).collect();

        let mut lines: Vec<String> = failures
            .iter()
            .take(limit)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.file_name(),
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();

        if failures.len() > limit {
            lines.push(format!("... and {} more", failures.len() - limit));
        }

        lines
    }
}

/// Processes a directory of files one at a time.
pub struct BatchOrchestrator {
    runner: JobRunner,
    retry: RetryPolicy,
}

impl BatchOrchestrator {
    pub fn new(runner: JobRunner) -> Self {
        Self {
            runner,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(engine: Arc<dyn MediaEngine>, config: &Config) -> Self {
        Self::new(JobRunner::from_config(engine, config)).with_retry_policy(config.retry.batch_policy())
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run every recognized file in `job.input_dir`.
    ///
    /// Per-file failures, including invalid shared options, are recorded in
    /// the report and never abort the run. Only directory-level problems do.
    /// One progress event is sent per file; a closed receiver is ignored.
    pub async fn run(
        &self,
        job: &BatchJob,
        progress: UnboundedSender<BatchProgress>,
    ) -> Result<BatchReport> {
        let start_time = Instant::now();

        tokio::fs::create_dir_all(&job.output_dir).await?;

        let files = audio_files_in(&job.input_dir).await?;
        if files.is_empty() {
            return Err(TrimError::EmptyBatch(job.input_dir.clone()));
        }

        let total = files.len();
        info!(
            "Processing {} files from {} into {} using {}",
            total,
            job.input_dir.display(),
            job.output_dir.display(),
            self.runner.engine().name()
        );

        let mut results = Vec::with_capacity(total);

        for (index, input) in files.iter().enumerate() {
            let output = batch_output_path(
                &job.output_dir,
                input,
                &job.filename_prefix,
                &job.filename_suffix,
                job.options.output_format,
            );
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let mut tracker = FileTracker::new(name.clone());

            let item = if same_location(input, &output) {
                warn!("Skipping {}: output would overwrite input", input.display());
                tracker.advance(FileState::Failed);
                BatchItemResult::failed(input, &output, BATCH_OVERWRITE_MESSAGE)
            } else {
                let audio_job = AudioJob::new(input, &output).with_options(job.options.clone());
                self.process_file(&audio_job, &mut tracker).await
            };

            results.push(item);

            if progress
                .send(BatchProgress::new(index + 1, total, name))
                .is_err()
            {
                debug!("Progress receiver closed, continuing batch");
            }
        }

        let report = BatchReport {
            results,
            elapsed: start_time.elapsed(),
        };
        info!(
            "Batch complete: {} succeeded, {} failed in {:.2}s",
            report.succeeded(),
            report.failed(),
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    async fn process_file(&self, job: &AudioJob, tracker: &mut FileTracker) -> BatchItemResult {
        let mut retries = 0;

        loop {
            match self.attempt(job, tracker).await {
                Ok(result) => {
                    tracker.advance(FileState::Succeeded);
                    return BatchItemResult::succeeded(result);
                }
                Err(e) => {
                    tracker.advance(FileState::Failed);
                    let message = e.to_string();

                    if retries < self.retry.max_retries && self.retry.is_transient(&message) {
                        retries += 1;
                        warn!(
                            "{} failed with a transient error, retrying in {:?}: {}",
                            tracker.name, self.retry.delay, message
                        );
                        tokio::time::sleep(self.retry.delay).await;
                        continue;
                    }

                    warn!("{} failed: {}", tracker.name, message);
                    return BatchItemResult::failed(&job.input_path, &job.output_path, message);
                }
            }
        }
    }

    async fn attempt(&self, job: &AudioJob, tracker: &mut FileTracker) -> Result<JobResult> {
        tracker.advance(FileState::Preparing);
        let prepared = self.runner.prepare(job).await?;
        tracker.advance(FileState::Encoding);
        self.runner.execute(&prepared).await
    }
}

/// Print a summary of a finished batch run.
pub fn print_batch_summary(report: &BatchReport, failure_limit: usize) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      {}", style("Batch Complete").green().bold());
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Files:      {}", report.results.len());
    println!("  Succeeded:  {}", style(report.succeeded()).green());
    if report.failed() > 0 {
        println!("  Failed:     {}", style(report.failed()).red());
    }
    println!("  Elapsed:    {:.2}s", report.elapsed.as_secs_f64());

    let failures = report.failure_summary(failure_limit);
    if !failures.is_empty() {
        println!();
        println!("  Failures:");
        for line in failures {
            println!("    {}", style(line).red());
        }
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, error: Option<&str>) -> BatchItemResult {
        BatchItemResult {
            input_path: PathBuf::from("/in").join(name),
            output_path: PathBuf::from("/out").join(name),
            success: error.is_none(),
            error: error.map(str::to_string),
            duration: error.is_none().then_some(1.0),
        }
    }

    #[test]
    fn test_progress_percent_rounds_up() {
        let percents: Vec<u8> = (1..=3).map(|i| BatchProgress::new(i, 3, "a.mp3").percent).collect();
        assert_eq!(percents, vec![34, 67, 100]);
        assert_eq!(BatchProgress::new(1, 4, "a.mp3").percent, 25);
        assert_eq!(BatchProgress::new(1, 1, "a.mp3").percent, 100);
    }

    #[test]
    fn test_transient_keywords() {
        let policy = RetryPolicy::default();
        assert!(policy.is_transient("Resource temporarily unavailable"));
        assert!(policy.is_transient("connection timeout"));
        assert!(policy.is_transient("Device or resource busy"));
        assert!(!policy.is_transient("Audio file appears to be corrupted or invalid"));
        assert!(!policy.is_transient(BATCH_OVERWRITE_MESSAGE));
    }

    #[test]
    fn test_empty_keyword_list_disables_retry() {
        let policy = RetryPolicy {
            transient_keywords: Vec::new(),
            ..RetryPolicy::default()
        };
        assert!(!policy.is_transient("timeout"));
    }

    #[test]
    fn test_state_transitions() {
        use FileState::*;
        assert!(Pending.can_advance_to(Preparing));
        assert!(Preparing.can_advance_to(Encoding));
        assert!(Encoding.can_advance_to(Succeeded));
        assert!(Failed.can_advance_to(Preparing));
        assert!(!Succeeded.can_advance_to(Preparing));
        assert!(!Pending.can_advance_to(Encoding));
        assert!(Failed.is_terminal());
        assert!(!Encoding.is_terminal());
    }

    #[test]
    fn test_failure_summary_is_capped() {
        let mut results = vec![item("ok.mp3", None)];
        for i in 0..7 {
            results.push(item(&format!("bad{i}.mp3"), Some("File validation failed: File is empty")));
        }
        let report = BatchReport {
            results,
            elapsed: Duration::ZERO,
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 7);

        let lines = report.failure_summary(5);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "bad0.mp3: File validation failed: File is empty");
        assert_eq!(lines[5], "... and 2 more");
    }

    #[test]
    fn test_item_result_wire_shape() {
        let json = serde_json::to_value(item("a.wav", Some("boom"))).unwrap();
        assert_eq!(json["inputPath"], "/in/a.wav");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("duration").is_none());
    }
}
