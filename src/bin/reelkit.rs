use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reelkit::{
    ExtractOptions, FfmpegLogLevel, SamplingPolicy, VideoSource, extract_keyframes,
    remote::{
        api::{GenerationInput, GenerationParameters, GenerationRequest, MediaRefs, SubmitOutcome},
        client::{ApiConfig, VideoClient},
        store::{DEFAULT_RECENT_LIMIT, TaskStore},
    },
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  reelkit metadata input.mp4 --json\n  reelkit extract-frames input.mp4 --out frames --count 8 --policy uniform\n  reelkit submit --model wan2.6-i2v --prompt \"a red fox\" --image frame_0000.jpg\n  reelkit query task-abc123\n  reelkit completions zsh > _reelkit";

#[derive(Debug, Parser)]
#[command(
    name = "reelkit",
    version,
    about = "Extract video keyframes and drive cloud video generation",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg log level.
    #[arg(long, value_enum)]
    log_level: Option<FfmpegLogLevel>,

    /// Directory for local task records.
    #[arg(long, default_value = "tasks")]
    tasks_dir: PathBuf,

    /// API key; falls back to the DASHSCOPE_API_KEY environment variable.
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print metadata for a video file (alias: probe).
    #[command(
        about = "Print video metadata",
        visible_alias = "probe",
        visible_alias = "info",
        after_help = "Examples:\n  reelkit metadata input.mp4\n  reelkit metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: String,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract keyframes to a timestamped output directory.
    #[command(
        about = "Extract keyframes",
        after_help = "Examples:\n  reelkit extract-frames input.mp4 --out frames --count 8\n  reelkit extract-frames input.mp4 --out frames --count 5 --policy change-detection"
    )]
    ExtractFrames {
        /// Input video path.
        input: String,
        /// Base directory; frames land in a fresh timestamped subdirectory.
        #[arg(long, default_value = "frames")]
        out: PathBuf,
        /// Number of frames to extract.
        #[arg(long, default_value_t = 5)]
        count: u64,
        /// Frame selection policy.
        #[arg(long, value_enum, default_value_t = SamplingPolicy::Uniform)]
        policy: SamplingPolicy,
        /// JPEG quality (1-100).
        #[arg(long, default_value_t = 85)]
        quality: u8,
        /// Pixel-difference threshold for the change-detection policy.
        #[arg(long, default_value_t = reelkit::DEFAULT_CHANGE_THRESHOLD)]
        threshold: u64,
    },

    /// Submit a video-generation request.
    #[command(
        about = "Submit a generation task",
        after_help = "Examples:\n  reelkit submit --model wan2.6-t2v --prompt \"a red fox running through snow\"\n  reelkit submit --model wan2.6-i2v --prompt \"make it snow\" --image frame_0000.jpg --resolution 1080P"
    )]
    Submit {
        /// Model identifier.
        #[arg(long)]
        model: String,
        /// Text prompt.
        #[arg(long)]
        prompt: Option<String>,
        /// Driving image: local path, URL, or data URI.
        #[arg(long)]
        image: Option<String>,
        /// Driving audio: local path, URL, or data URI.
        #[arg(long)]
        audio: Option<String>,
        /// Driving video: local path, URL, or data URI.
        #[arg(long)]
        video: Option<String>,
        /// First keyframe for keyframe-to-video models.
        #[arg(long)]
        first_frame: Option<String>,
        /// Last keyframe for keyframe-to-video models.
        #[arg(long)]
        last_frame: Option<String>,
        /// Output resolution label (e.g. 720P, 1080P).
        #[arg(long)]
        resolution: Option<String>,
        /// Clip duration in seconds.
        #[arg(long)]
        duration: Option<u32>,
        /// Generate an audio track.
        #[arg(long)]
        with_audio: bool,
        /// Let the provider expand the prompt.
        #[arg(long)]
        prompt_extend: bool,
        /// Watermark the output.
        #[arg(long)]
        watermark: bool,
    },

    /// Query the status of a submitted task.
    #[command(
        about = "Query task status",
        after_help = "Examples:\n  reelkit query task-abc123"
    )]
    Query {
        /// Remote task id.
        task_id: String,
    },

    /// List the most recent local task records.
    #[command(
        about = "List recent tasks",
        after_help = "Examples:\n  reelkit recent\n  reelkit recent --limit 5 --json"
    )]
    Recent {
        /// Maximum number of records to show.
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,

        /// Output records as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn apply_global_options(global: &GlobalOptions) {
    let filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Some(level) = global.log_level {
        reelkit::set_ffmpeg_log_level(level);
    }
}

fn spinner(message: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(bar)
}

fn build_client(global: &GlobalOptions) -> Result<VideoClient, Box<dyn std::error::Error>> {
    let config = match &global.api_key {
        Some(key) => ApiConfig::new(key.clone()),
        None => ApiConfig::from_env()?,
    };
    let store = TaskStore::open(&global.tasks_dir)?;
    Ok(VideoClient::new(config, store)?)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global);

    match cli.command {
        Commands::Metadata { input, json } => {
            let source = VideoSource::open(&input)?;
            let metadata = source.metadata();
            if json {
                let payload = json!({
                    "format": metadata.format,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "width": metadata.width,
                    "height": metadata.height,
                    "fps": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "codec": metadata.codec,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", metadata.format);
                println!("Duration: {:?}", metadata.duration);
                println!(
                    "Video: {}x{} @ {:.2} fps [{}]",
                    metadata.width, metadata.height, metadata.frames_per_second, metadata.codec,
                );
                println!("Frames: {}", metadata.frame_count);
            }
        }
        Commands::ExtractFrames {
            input,
            out,
            count,
            policy,
            quality,
            threshold,
        } => {
            if count == 0 {
                return Err("--count must be greater than 0".into());
            }

            let mut source = VideoSource::open(&input)?;
            let options = ExtractOptions::new()
                .with_policy(policy)
                .with_quality(quality)
                .with_change_threshold(threshold);

            let bar = spinner(&format!("extracting {count} frame(s) from {input}"))?;
            let frames = extract_keyframes(&mut source, count, &out, &options)?;
            bar.finish_and_clear();

            println!(
                "{} {} frame(s) -> {}",
                "saved".green().bold(),
                frames.files.len(),
                frames.output_dir.display()
            );
            if frames.skipped > 0 {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} selected frame(s) failed to decode", frames.skipped).yellow()
                );
            }
        }
        Commands::Submit {
            model,
            prompt,
            image,
            audio,
            video,
            first_frame,
            last_frame,
            resolution,
            duration,
            with_audio,
            prompt_extend,
            watermark,
        } => {
            let client = build_client(&cli.global)?;
            let request = GenerationRequest {
                model,
                input: GenerationInput {
                    prompt,
                    media: MediaRefs {
                        img_url: image,
                        audio_url: audio,
                        video_url: video,
                        first_frame_url: first_frame,
                        last_frame_url: last_frame,
                    },
                },
                parameters: GenerationParameters {
                    resolution,
                    duration,
                    audio: with_audio.then_some(true),
                    shot_type: None,
                    prompt_extend: prompt_extend.then_some(true),
                    watermark: watermark.then_some(true),
                },
            };

            let bar = spinner("submitting generation request")?;
            let outcome = client.submit(request);
            bar.finish_and_clear();

            match outcome? {
                SubmitOutcome::Submitted { task_id } => {
                    println!("{} task id: {task_id}", "submitted".green().bold());
                    println!("Poll with: reelkit query {task_id}");
                }
                SubmitOutcome::Completed { video_url } => {
                    println!("{} {video_url}", "completed".green().bold());
                    println!("The URL stays valid for 24 hours; download promptly.");
                }
                SubmitOutcome::Failed { code, message } => {
                    eprintln!(
                        "{} [{}] {}",
                        "rejected".red().bold(),
                        code.as_deref().unwrap_or("unknown"),
                        message
                    );
                    std::process::exit(1);
                }
            }
        }
        Commands::Query { task_id } => {
            let client = build_client(&cli.global)?;
            let bar = spinner(&format!("querying task {task_id}"))?;
            let report = client.query(&task_id);
            bar.finish_and_clear();

            let report = report?;
            println!("Task: {}", report.task_id);
            println!("Status: {}", report.status.to_string().cyan().bold());
            println!("{}", report.guidance);
        }
        Commands::Recent { limit, json } => {
            let store = TaskStore::open(&cli.global.tasks_dir)?;
            let records = store.list_recent(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No task records in {}", cli.global.tasks_dir.display());
            } else {
                for record in records {
                    println!(
                        "{}  {:<9}  {}  {}",
                        record.submit_time.format("%Y-%m-%d %H:%M:%S"),
                        record.status.to_string(),
                        record.task_id.as_deref().unwrap_or("-"),
                        record.model,
                    );
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reelkit", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
