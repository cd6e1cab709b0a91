//! Core [`VideoSource`] implementation.
//!
//! `VideoSource` is the entry point for frame extraction. It opens a video
//! file, locates the best video stream, caches metadata, and provides the
//! decode passes used by the sampling policies. The demuxer and decoder
//! handles are owned by the struct and released when it is dropped, on every
//! exit path.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::error::ReelError;

/// Metadata for the best video stream, extracted once at open time.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second.
    pub frames_per_second: f64,
    /// Estimated total frame count (duration × fps).
    pub frame_count: u64,
    /// Codec name (e.g. `h264`).
    pub codec: String,
    /// Container format name (e.g. `mov,mp4,m4a,3gp,3g2,mj2`).
    pub format: String,
    /// Container-level duration.
    pub duration: Duration,
}

/// An opened, seekable, frame-indexed video stream.
///
/// Created via [`VideoSource::open`]. Holds the demuxer context and cached
/// metadata for the duration of one extraction call.
///
/// # Example
///
/// ```no_run
/// use reelkit::VideoSource;
///
/// let source = VideoSource::open("input.mp4").unwrap();
/// let metadata = source.metadata();
/// println!("{} frames at {:.2} fps", metadata.frame_count, metadata.frames_per_second);
/// ```
pub struct VideoSource {
    /// The opened FFmpeg input (demuxer) context.
    pub(crate) input_context: Input,
    /// Index of the best video stream.
    pub(crate) video_stream_index: usize,
    /// Cached metadata extracted at open time.
    pub(crate) metadata: VideoMetadata,
    /// Path to the opened file (kept for error messages).
    pub(crate) file_path: PathBuf,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video file for frame extraction.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, locates the best
    /// video stream, and caches its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::FileOpen`] if the file cannot be opened, or
    /// [`ReelError::NoVideoStream`] if it carries no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReelError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening video source: {}", file_path.display());

        // Initialise ffmpeg (safe to call multiple times).
        ffmpeg_next::init().map_err(|error| ReelError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| ReelError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let video_stream_index = input_context
            .streams()
            .best(Type::Video)
            .map(|stream| stream.index())
            .ok_or(ReelError::NoVideoStream)?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let format = input_context.format().name().to_string();

        let stream = input_context
            .stream(video_stream_index)
            .ok_or(ReelError::NoVideoStream)?;

        let codec_parameters = stream.parameters();
        let decoder_context =
            CodecContext::from_parameters(codec_parameters).map_err(|error| {
                ReelError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let video_decoder =
            decoder_context
                .decoder()
                .video()
                .map_err(|error| ReelError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to create video decoder: {error}"),
                })?;

        let width = video_decoder.width();
        let height = video_decoder.height();

        // Compute frames per second from the stream's average frame rate.
        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            // Fallback: try the stream's rate field.
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let frame_count = if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width,
            height,
            frames_per_second,
            frame_count,
            codec,
            format,
            duration,
        };

        log::info!(
            "Opened video source: {} (format={}, {}x{}, {:.2} fps, ~{} frames)",
            file_path.display(),
            metadata.format,
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
        );

        drop(stream);

        Ok(Self {
            input_context,
            video_stream_index,
            metadata,
            file_path,
        })
    }

    /// Get a reference to the cached video metadata.
    ///
    /// Metadata is extracted once during [`open`](VideoSource::open) and
    /// does not require additional decoding.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Decode frames at specific (possibly duplicated) frame numbers.
    ///
    /// Sorts and deduplicates the requested numbers, seeks to the first one,
    /// and decodes forward, invoking `handler` once per matched frame number.
    /// Numbers the decoder skips past (e.g. because the seek landed beyond
    /// them, or the stream ends early) are simply not delivered; the caller
    /// observes them as missing.
    pub(crate) fn decode_indices<F>(
        &mut self,
        frame_numbers: &[u64],
        mut handler: F,
    ) -> Result<(), ReelError>
    where
        F: FnMut(u64, DynamicImage) -> Result<(), ReelError>,
    {
        if frame_numbers.is_empty() {
            return Ok(());
        }

        let frames_per_second = self.metadata.frames_per_second;
        let target_width = self.metadata.width;
        let target_height = self.metadata.height;

        let mut sorted_numbers = frame_numbers.to_vec();
        sorted_numbers.sort_unstable();
        sorted_numbers.dedup();

        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(ReelError::NoVideoStream)?;
        let time_base = stream.time_base();
        let codec_parameters = stream.parameters();
        let decoder_context = CodecContext::from_parameters(codec_parameters)?;
        let mut decoder = decoder_context.decoder().video()?;

        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            target_width,
            target_height,
            ScalingFlags::BILINEAR,
        )?;

        // Seek to the first requested frame.
        let first_timestamp =
            frame_number_to_stream_timestamp(sorted_numbers[0], frames_per_second, time_base);
        self.input_context.seek(first_timestamp, ..first_timestamp)?;

        let mut target_index = 0;
        let mut decoded_frame = VideoFrame::empty();
        let mut rgb_frame = VideoFrame::empty();

        for (stream, packet) in self.input_context.packets() {
            if target_index >= sorted_numbers.len() {
                break;
            }
            if stream.index() != self.video_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                if target_index >= sorted_numbers.len() {
                    break;
                }

                let pts = decoded_frame.pts().unwrap_or(0);
                let current_frame_number =
                    pts_to_frame_number(pts, time_base, frames_per_second);

                // Skip target numbers before the current position (can happen
                // after a seek lands past the target).
                while target_index < sorted_numbers.len()
                    && sorted_numbers[target_index] < current_frame_number
                {
                    target_index += 1;
                }

                if target_index < sorted_numbers.len()
                    && current_frame_number == sorted_numbers[target_index]
                {
                    scaler.run(&decoded_frame, &mut rgb_frame)?;
                    let image = convert_frame_to_image(&rgb_frame, target_width, target_height)?;
                    handler(current_frame_number, image)?;
                    target_index += 1;
                }
            }
        }

        // Flush the decoder for any remaining frames.
        if target_index < sorted_numbers.len() {
            decoder.send_eof()?;
            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                if target_index >= sorted_numbers.len() {
                    break;
                }

                let pts = decoded_frame.pts().unwrap_or(0);
                let current_frame_number =
                    pts_to_frame_number(pts, time_base, frames_per_second);

                while target_index < sorted_numbers.len()
                    && sorted_numbers[target_index] < current_frame_number
                {
                    target_index += 1;
                }

                if target_index < sorted_numbers.len()
                    && current_frame_number == sorted_numbers[target_index]
                {
                    scaler.run(&decoded_frame, &mut rgb_frame)?;
                    let image = convert_frame_to_image(&rgb_frame, target_width, target_height)?;
                    handler(current_frame_number, image)?;
                    target_index += 1;
                }
            }
        }

        Ok(())
    }

    /// Decode every frame sequentially from the start of the stream.
    ///
    /// Invokes `handler` with the frame number and tightly-packed RGB24
    /// pixel buffer of each decoded frame, in temporal order. The handler
    /// returns `false` to stop the pass early.
    pub(crate) fn decode_sequential<F>(&mut self, mut handler: F) -> Result<(), ReelError>
    where
        F: FnMut(u64, &[u8]) -> Result<bool, ReelError>,
    {
        let frames_per_second = self.metadata.frames_per_second;
        let target_width = self.metadata.width;
        let target_height = self.metadata.height;

        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(ReelError::NoVideoStream)?;
        let time_base = stream.time_base();
        let codec_parameters = stream.parameters();
        let decoder_context = CodecContext::from_parameters(codec_parameters)?;
        let mut decoder = decoder_context.decoder().video()?;

        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            target_width,
            target_height,
            ScalingFlags::BILINEAR,
        )?;

        // Rewind to the start of the stream.
        self.input_context.seek(0, ..0)?;

        let mut decoded_frame = VideoFrame::empty();
        let mut rgb_frame = VideoFrame::empty();

        for (stream, packet) in self.input_context.packets() {
            if stream.index() != self.video_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                let pts = decoded_frame.pts().unwrap_or(0);
                let frame_number = pts_to_frame_number(pts, time_base, frames_per_second);

                scaler.run(&decoded_frame, &mut rgb_frame)?;
                let buffer = frame_to_rgb_buffer(&rgb_frame, target_width, target_height);
                if !handler(frame_number, &buffer)? {
                    return Ok(());
                }
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            let pts = decoded_frame.pts().unwrap_or(0);
            let frame_number = pts_to_frame_number(pts, time_base, frames_per_second);

            scaler.run(&decoded_frame, &mut rgb_frame)?;
            let buffer = frame_to_rgb_buffer(&rgb_frame, target_width, target_height);
            if !handler(frame_number, &buffer)? {
                return Ok(());
            }
        }

        Ok(())
    }
}

/// Convert a scaled RGB24 video frame to an [`image::DynamicImage`].
fn convert_frame_to_image(
    rgb_frame: &VideoFrame,
    width: u32,
    height: u32,
) -> Result<DynamicImage, ReelError> {
    let buffer = frame_to_rgb_buffer(rgb_frame, width, height);
    let rgb_image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        ReelError::VideoDecodeError(
            "Failed to construct RGB image from decoded frame data".to_string(),
        )
    })?;
    Ok(DynamicImage::ImageRgb8(rgb_image))
}

/// Copy pixel data from an FFmpeg video frame into a tightly-packed RGB buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3).
/// This strips that padding so the result can be passed directly to
/// [`image::RgbImage::from_raw`].
fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == expected_stride {
        // No padding — fast path: copy the entire plane at once.
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        // Stride includes padding bytes — copy row by row.
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Convert a frame number to a timestamp in the stream's time base.
fn frame_number_to_stream_timestamp(
    frame_number: u64,
    frames_per_second: f64,
    time_base: Rational,
) -> i64 {
    let seconds = if frames_per_second > 0.0 {
        frame_number as f64 / frames_per_second
    } else {
        0.0
    };
    let numerator = time_base.numerator() as f64;
    let denominator = time_base.denominator() as f64;
    (seconds * denominator / numerator) as i64
}

/// Rescale a PTS value to a frame number.
fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
    (seconds * frames_per_second).round().max(0.0) as u64
}
