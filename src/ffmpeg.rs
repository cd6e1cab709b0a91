//! FFmpeg stderr verbosity control.
//!
//! FFmpeg logs to stderr on its own, outside the Rust `log` crate, and a
//! decode pass over a slightly damaged file can be noisy. This exposes the
//! `AV_LOG_*` levels so callers can quiet that output; the CLI surfaces it
//! as `--log-level`. Rust-side diagnostics are unaffected — configure those
//! through `env_logger` as usual.

use clap::ValueEnum;
use ffmpeg_next::util::log::Level;

/// FFmpeg internal log verbosity, most quiet to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only unrecoverable conditions that abort the process.
    Panic,
    /// Unrecoverable errors; the context becomes invalid.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

/// Set the verbosity of FFmpeg's own stderr output.
///
/// # Example
///
/// ```no_run
/// use reelkit::FfmpegLogLevel;
///
/// // Only show errors and above.
/// reelkit::set_ffmpeg_log_level(FfmpegLogLevel::Error);
/// ```
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    let level = match level {
        FfmpegLogLevel::Quiet => Level::Quiet,
        FfmpegLogLevel::Panic => Level::Panic,
        FfmpegLogLevel::Fatal => Level::Fatal,
        FfmpegLogLevel::Error => Level::Error,
        FfmpegLogLevel::Warning => Level::Warning,
        FfmpegLogLevel::Info => Level::Info,
        FfmpegLogLevel::Verbose => Level::Verbose,
        FfmpegLogLevel::Debug => Level::Debug,
        FfmpegLogLevel::Trace => Level::Trace,
    };
    ffmpeg_next::util::log::set_level(level);
}
