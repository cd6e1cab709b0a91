//! # reelkit
//!
//! Extract keyframes from videos and drive a cloud video-generation API.
//!
//! `reelkit` has two independent halves:
//!
//! - **Keyframe extraction** — open a video with [`VideoSource`], pick frames
//!   with a [`SamplingPolicy`] (uniform, fixed interval, or change detection),
//!   and materialize them as JPEG files plus bounded previews with
//!   [`extract_keyframes`]. Decoding is powered by FFmpeg via the
//!   [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//! - **Remote generation** — submit image/audio/video-driven generation
//!   requests with [`remote::client::VideoClient`], poll task status, and keep
//!   append-only local JSON records of every submission in a
//!   [`remote::store::TaskStore`].
//!
//! ## Quick Start
//!
//! ### Extract Keyframes
//!
//! ```no_run
//! use reelkit::{ExtractOptions, SamplingPolicy, VideoSource, extract_keyframes};
//!
//! let mut source = VideoSource::open("input.mp4").unwrap();
//! let options = ExtractOptions::new().with_policy(SamplingPolicy::Uniform);
//! let frames = extract_keyframes(&mut source, 8, "outputs".as_ref(), &options).unwrap();
//! println!("saved {} frames to {}", frames.files.len(), frames.output_dir.display());
//! ```
//!
//! ### Submit a Generation Task
//!
//! ```no_run
//! use reelkit::remote::{
//!     api::{GenerationInput, GenerationParameters, GenerationRequest, MediaRefs},
//!     client::{ApiConfig, VideoClient},
//!     store::TaskStore,
//! };
//!
//! let store = TaskStore::open("tasks").unwrap();
//! let client = VideoClient::new(ApiConfig::from_env().unwrap(), store).unwrap();
//!
//! let request = GenerationRequest {
//!     model: "wan2.6-i2v".to_string(),
//!     input: GenerationInput {
//!         prompt: Some("a red fox running through snow".to_string()),
//!         media: MediaRefs {
//!             img_url: Some("frame_0000.jpg".to_string()),
//!             ..Default::default()
//!         },
//!     },
//!     parameters: GenerationParameters::default(),
//! };
//! let outcome = client.submit(request).unwrap();
//! println!("{outcome:?}");
//! ```
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system for the
//! extraction half; the remote half has no native dependencies.

mod audio;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod media;
pub mod remote;
pub mod sampler;

pub use error::ReelError;
pub use extract::{
    DEFAULT_JPEG_QUALITY, ExtractOptions, ExtractedFrames, PREVIEW_MAX_DIMENSION,
    extract_keyframes, extract_selection,
};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use media::{VideoMetadata, VideoSource};
pub use sampler::{
    DEFAULT_CHANGE_THRESHOLD, SamplingPolicy, select_change_frames, select_frames,
};
