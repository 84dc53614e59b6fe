pub mod batch;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod plan;
pub mod transcode;

pub use batch::{print_batch_summary, BatchItemResult, BatchOrchestrator, BatchProgress, BatchReport, RetryPolicy};
pub use config::Config;
pub use error::{Result, TrimError};
pub use job::{AudioJob, BatchJob, JobOptions, JobRequest, OutputFormat};
pub use media::{FfmpegEngine, MediaEngine};
pub use pipeline::{print_summary, JobResult, JobRunner, PreparedJob};
