use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tracktrim::job::{BatchResponse, JobResponse};
use tracktrim::media::scan_directory;
use tracktrim::{
    print_batch_summary, print_summary, AudioJob, BatchJob, BatchOrchestrator, BatchProgress,
    Config, FfmpegEngine, JobOptions, JobRequest, JobRunner, MediaEngine,
};

#[derive(Parser)]
#[command(name = "tracktrim")]
#[command(version, about = "Trim, fade and re-encode audio files with FFmpeg")]
#[command(long_about = "Cut a time range out of an audio file, add fades, normalize loudness and convert between formats. Works on a single file or a whole directory.")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trim a single file
    Trim {
        /// Input audio file
        input: PathBuf,

        /// Output file (defaults to <name>_trimmed.<ext> beside the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: TrimArgs,
    },

    /// Trim every audio file in a directory
    Batch {
        input_dir: PathBuf,

        output_dir: PathBuf,

        /// Prepended to each output file name
        #[arg(long, default_value = "")]
        prefix: String,

        /// Appended to each output file name, before the extension
        #[arg(long, default_value = "")]
        suffix: String,

        #[command(flatten)]
        options: TrimArgs,
    },

    /// List the audio files a batch run would pick up
    Scan { dir: PathBuf },

    /// Run a JSON job request from a file or stdin, printing JSON lines
    Request { file: Option<PathBuf> },
}

#[derive(Args, Debug, Clone)]
struct TrimArgs {
    /// Start time in seconds
    #[arg(long)]
    start: Option<f64>,

    /// End time in seconds
    #[arg(long)]
    end: Option<f64>,

    /// Fade-in duration in seconds
    #[arg(long, default_value_t = 0.0)]
    fade_in: f64,

    /// Fade-out duration in seconds
    #[arg(long, default_value_t = 0.0)]
    fade_out: f64,

    /// Apply EBU R128 loudness normalization
    #[arg(long)]
    normalize: bool,

    /// Output format: same, mp3, wav, flac, m4a, aac, ogg, wma, mp4
    #[arg(short, long)]
    format: Option<String>,

    /// Audio bitrate in kbps, or auto
    #[arg(short, long)]
    bitrate: Option<String>,

    /// Sample rate in Hz, or auto
    #[arg(short = 'r', long)]
    sample_rate: Option<String>,
}

impl TrimArgs {
    /// Command-line values win over the configured defaults.
    fn to_options(&self, config: &Config) -> Result<JobOptions> {
        let output_format = match self.format {
            Some(ref f) => f.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            None => config.default_format,
        };
        let audio_bitrate = match self.bitrate {
            Some(ref b) => b.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            None => config.default_bitrate,
        };
        let sample_rate = match self.sample_rate {
            Some(ref r) => r.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            None => config.default_sample_rate,
        };

        Ok(JobOptions {
            start_time: self.start,
            end_time: self.end,
            fade_in_duration: self.fade_in,
            fade_out_duration: self.fade_out,
            normalize_volume: self.normalize,
            output_format,
            audio_bitrate,
            sample_rate,
        })
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for summaries and JSON output
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn derive_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let name = match input.extension() {
        Some(ext) => format!("{}_trimmed.{}", stem, ext.to_string_lossy()),
        None => format!("{}_trimmed", stem),
    };
    input.with_file_name(name)
}

fn load_config() -> Result<Config> {
    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

async fn locate_engine(config: &Config) -> Result<Arc<dyn MediaEngine>> {
    let engine = FfmpegEngine::locate(&config.resolver()).context(
        "FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)",
    )?;
    engine.check().await.context("FFmpeg self-check failed")?;
    info!("Using FFmpeg at {}", engine.ffmpeg_path().display());
    Ok(Arc::new(engine))
}

async fn run_trim(input: PathBuf, output: Option<PathBuf>, args: &TrimArgs) -> Result<()> {
    let config = load_config()?;
    let options = args.to_options(&config)?;
    let output = output.unwrap_or_else(|| derive_output_path(&input));
    let engine = locate_engine(&config).await?;

    info!("Input:    {}", input.display());
    info!("Output:   {}", output.display());
    info!("Format:   {}", options.output_format);

    let job = AudioJob::new(&input, &output).with_options(options);
    let runner = JobRunner::from_config(engine, &config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Processing {}...", input.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    match runner.run(&job).await {
        Ok(result) => {
            pb.finish_with_message(format!("✓ Wrote {}", result.output_path.display()));
            print_summary(&result, start.elapsed());
            Ok(())
        }
        Err(e) => {
            pb.finish_with_message(format!("{} {}", style("✗").red(), e));
            Err(e).with_context(|| format!("Failed to process {}", input.display()))
        }
    }
}

async fn run_batch(
    input_dir: PathBuf,
    output_dir: PathBuf,
    prefix: String,
    suffix: String,
    args: &TrimArgs,
) -> Result<()> {
    let config = load_config()?;
    let options = args.to_options(&config)?;
    let engine = locate_engine(&config).await?;

    let job = BatchJob::new(input_dir, output_dir)
        .with_affixes(prefix, suffix)
        .with_options(options);
    let orchestrator = BatchOrchestrator::from_config(engine, &config);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let (tx, rx) = mpsc::unbounded_channel::<BatchProgress>();
    let (report, ()) = futures::join!(orchestrator.run(&job, tx), follow_progress(&pb, rx));
    let report = report.with_context(|| format!("Batch failed for {}", job.input_dir.display()))?;
    pb.finish_with_message("done");

    print_batch_summary(&report, config.failure_report_limit);

    if report.failed() > 0 {
        anyhow::bail!(
            "{} of {} files failed",
            report.failed(),
            report.results.len()
        );
    }
    Ok(())
}

async fn run_scan(dir: PathBuf) -> Result<()> {
    let files = scan_directory(&dir)
        .await
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    if files.is_empty() {
        println!("{}", style("No audio files found").yellow());
        return Ok(());
    }

    for file in &files {
        println!("  {:<6} {}", style(&file.ext).cyan(), file.name);
    }
    println!();
    println!("{} audio files", style(files.len()).bold());
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Mirror batch progress events onto a progress bar until the sender is dropped.
async fn follow_progress(pb: &ProgressBar, mut rx: mpsc::UnboundedReceiver<BatchProgress>) {
    while let Some(progress) = rx.recv().await {
        pb.set_length(progress.total as u64);
        pb.set_position(progress.current as u64);
        pb.set_message(progress.file);
    }
}

async fn read_request<R: AsyncRead + Unpin>(mut reader: R) -> Result<JobRequest> {
    let mut raw = String::new();
    reader
        .read_to_string(&mut raw)
        .await
        .context("Failed to read job request")?;
    serde_json::from_str(&raw).context("Invalid job request")
}

async fn run_request(file: Option<PathBuf>) -> Result<()> {
    let request = match file {
        Some(ref path) => {
            let reader = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            read_request(reader).await?
        }
        None => read_request(tokio::io::stdin()).await?,
    };

    let config = load_config()?;
    let engine = FfmpegEngine::locate(&config.resolver())
        .map(|engine| Arc::new(engine) as Arc<dyn MediaEngine>);

    match request {
        JobRequest::Single(job) => {
            let outcome = match engine {
                Ok(engine) => JobRunner::from_config(engine, &config).run(&job).await,
                Err(e) => Err(e),
            };
            print_json(&JobResponse::from(outcome))
        }
        JobRequest::Batch(job) => {
            let engine = match engine {
                Ok(engine) => engine,
                Err(e) => return print_json(&BatchResponse::from(Err(e))),
            };
            let orchestrator = BatchOrchestrator::from_config(engine, &config);

            let (tx, mut rx) = mpsc::unbounded_channel::<BatchProgress>();
            let consume = async {
                while let Some(progress) = rx.recv().await {
                    print_json(&progress)?;
                }
                Ok::<(), anyhow::Error>(())
            };

            let (report, streamed) = futures::join!(orchestrator.run(&job, tx), consume);
            streamed?;
            print_json(&BatchResponse::from(report.map(|r| r.results)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Trim {
            input,
            output,
            options,
        } => run_trim(input, output, &options).await,
        Command::Batch {
            input_dir,
            output_dir,
            prefix,
            suffix,
            options,
        } => run_batch(input_dir, output_dir, prefix, suffix, &options).await,
        Command::Scan { dir } => run_scan(dir).await,
        Command::Request { file } => run_request(file).await,
    }
}
