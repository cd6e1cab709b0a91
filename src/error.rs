//! Error types for the `reelkit` crate.
//!
//! This module defines [`ReelError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry rich context to aid
//! debugging, including file paths, frame counts, and upstream error messages.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::remote::payload::MediaKind;

/// The unified error type for all `reelkit` operations.
///
/// Every public method that can fail returns `Result<T, ReelError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReelError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The file does not contain an audio stream.
    #[error("No audio stream found in file")]
    NoAudioStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Audio data could not be decoded.
    #[error("Failed to decode audio: {0}")]
    AudioDecodeError(String),

    /// Audio data could not be re-encoded after truncation.
    #[error("Failed to encode audio: {0}")]
    AudioEncodeError(String),

    /// The requested sample count cannot produce a valid frame selection.
    #[error(
        "Cannot select {requested_count} frame(s) from a video with {total_frames} frame(s)"
    )]
    InvalidSampleCount {
        /// Number of frames the caller asked for.
        requested_count: u64,
        /// Total frames in the video.
        total_frames: u64,
    },

    /// The chosen sampling policy needs decoded pixel data and cannot be
    /// evaluated from frame counts alone.
    #[error("Sampling policy {policy} requires an opened video source")]
    SelectionNeedsVideo {
        /// Name of the policy that was requested.
        policy: String,
    },

    /// A required local input file does not exist.
    #[error("Input file not found: {path}")]
    InputNotFound {
        /// Path the caller supplied.
        path: PathBuf,
    },

    /// A media input exceeds the per-kind size ceiling for embedding.
    #[error(
        "{kind} input {path} is {size} bytes, exceeding the {limit}-byte embedding limit; \
         compress the file or host it at a public URL instead"
    )]
    MediaTooLarge {
        /// Kind of media that was rejected.
        kind: MediaKind,
        /// Path of the offending file.
        path: PathBuf,
        /// Observed file size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        limit: u64,
    },

    /// A required request field was empty.
    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),

    /// No API credential was provided.
    #[error("Missing API credential: set the {0} environment variable or pass a key explicitly")]
    MissingCredential(&'static str),

    /// A transport-level failure talking to the remote API.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote API reported a failure for the request or task.
    #[error("Remote API error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Remote {
        /// Remote error code, when the API supplied one.
        code: Option<String>,
        /// Remote error message.
        message: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion or encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// A task record could not be serialized or deserialized.
    #[error("Task record error: {0}")]
    RecordError(#[from] serde_json::Error),
}

impl From<FfmpegError> for ReelError {
    fn from(error: FfmpegError) -> Self {
        ReelError::FfmpegError(error.to_string())
    }
}

impl From<reqwest::Error> for ReelError {
    fn from(error: reqwest::Error) -> Self {
        let detail = if error.is_timeout() {
            format!("request timed out: {error}")
        } else if error.is_connect() {
            format!("connection failed: {error}")
        } else {
            error.to_string()
        };
        ReelError::Transport(detail)
    }
}

impl From<hound::Error> for ReelError {
    fn from(error: hound::Error) -> Self {
        ReelError::AudioEncodeError(error.to_string())
    }
}
