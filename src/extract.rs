//! Frame materialization.
//!
//! Turns a frame selection into JPEG files on disk plus in-memory previews.
//! Output files are named by zero-padded *sequence* number
//! (`frame_0000.jpg`, `frame_0001.jpg`, …), not by source frame index —
//! sequence order is the contract.

use std::{collections::HashMap, fs, path::Path, path::PathBuf};

use image::{DynamicImage, codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::{
    error::ReelError,
    media::VideoSource,
    sampler::{DEFAULT_CHANGE_THRESHOLD, SamplingPolicy, select_change_frames, select_frames},
};

/// Longest-side cap for preview images, in pixels.
pub const PREVIEW_MAX_DIMENSION: u32 = 800;

/// Default JPEG quality for saved frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Options for frame extraction.
///
/// # Example
///
/// ```
/// use reelkit::{ExtractOptions, SamplingPolicy};
///
/// let options = ExtractOptions::new()
///     .with_policy(SamplingPolicy::Interval)
///     .with_quality(90)
///     .with_preview_max_dimension(640);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct ExtractOptions {
    /// Sampling policy used to pick frames.
    pub(crate) policy: SamplingPolicy,
    /// JPEG quality (1–100) for saved frames.
    pub(crate) quality: u8,
    /// Longest-side cap for preview images.
    pub(crate) preview_max_dimension: u32,
    /// Pixel-difference threshold for the change-detection policy.
    pub(crate) change_threshold: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with defaults: uniform policy, quality 85,
    /// 800-pixel previews, change threshold 1000.
    pub fn new() -> Self {
        Self {
            policy: SamplingPolicy::Uniform,
            quality: DEFAULT_JPEG_QUALITY,
            preview_max_dimension: PREVIEW_MAX_DIMENSION,
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
        }
    }

    /// Set the sampling policy.
    pub fn with_policy(mut self, policy: SamplingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the JPEG quality for saved frames. Clamped to 1–100.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set the longest-side cap for preview images.
    pub fn with_preview_max_dimension(mut self, max_dimension: u32) -> Self {
        self.preview_max_dimension = max_dimension.max(1);
        self
    }

    /// Set the pixel-difference threshold for the change-detection policy.
    pub fn with_change_threshold(mut self, threshold: u64) -> Self {
        self.change_threshold = threshold;
        self
    }
}

/// Result of one extraction call.
#[derive(Debug)]
pub struct ExtractedFrames {
    /// Saved JPEG paths, in selection order.
    pub files: Vec<PathBuf>,
    /// Bounded-dimension previews, one per saved file, in the same order.
    pub previews: Vec<DynamicImage>,
    /// Selected frames that failed to decode and were skipped.
    pub skipped: usize,
    /// The timestamped directory the frames were written into.
    pub output_dir: PathBuf,
}

/// Select frames by the configured policy and materialize them.
///
/// Convenience wrapper that computes the selection (including the
/// change-detection decode pass when configured) and delegates to
/// [`extract_selection`].
///
/// # Errors
///
/// Selection errors from [`select_frames`]/[`select_change_frames`], plus
/// anything [`extract_selection`] returns.
pub fn extract_keyframes(
    source: &mut VideoSource,
    requested_count: u64,
    base_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractedFrames, ReelError> {
    let selection = match options.policy {
        SamplingPolicy::ChangeDetection => {
            select_change_frames(source, requested_count, options.change_threshold)?
        }
        policy => select_frames(source.metadata().frame_count, requested_count, policy)?,
    };

    extract_selection(source, &selection, base_dir, options)
}

/// Materialize a frame selection as JPEG files and previews.
///
/// For each index in selection order: decode the frame, write
/// `frame_NNNN.jpg` at the configured quality into a fresh timestamped
/// directory under `base_dir`, and produce a preview whose longest side is
/// capped at the configured maximum (aspect ratio preserved).
///
/// A selected frame that fails to decode at its position is silently
/// skipped — no placeholder is emitted — and only counted in
/// [`ExtractedFrames::skipped`].
///
/// # Errors
///
/// Decode-pass setup errors, I/O errors creating the output directory, and
/// JPEG encoding errors.
///
/// # Example
///
/// ```no_run
/// use reelkit::{ExtractOptions, VideoSource, extract_selection};
///
/// let mut source = VideoSource::open("input.mp4")?;
/// let frames = extract_selection(
///     &mut source,
///     &[0, 30, 60],
///     "outputs".as_ref(),
///     &ExtractOptions::new(),
/// )?;
/// assert_eq!(frames.files.len() + frames.skipped, 3);
/// # Ok::<(), reelkit::ReelError>(())
/// ```
pub fn extract_selection(
    source: &mut VideoSource,
    selection: &[u64],
    base_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractedFrames, ReelError> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let output_dir = base_dir.join(format!("frames_{timestamp}"));
    fs::create_dir_all(&output_dir)?;

    log::info!(
        "Extracting {} frame(s) from {} into {}",
        selection.len(),
        source.file_path.display(),
        output_dir.display()
    );

    // Each distinct index is encoded to disk as soon as it is decoded, so
    // only the bounded previews stay in memory. Files get staging names
    // during the pass because the final sequence number depends on which
    // other frames decode successfully.
    let mut staged: HashMap<u64, PathBuf> = HashMap::new();
    let mut preview_by_frame: HashMap<u64, DynamicImage> = HashMap::new();
    let quality = options.quality;
    let preview_max_dimension = options.preview_max_dimension;
    source.decode_indices(selection, |frame_number, image| {
        let stage_path = output_dir.join(format!("stage_{frame_number}.jpg"));
        save_jpeg(&image, &stage_path, quality)?;

        let (preview_width, preview_height) =
            fit_dimensions(image.width(), image.height(), preview_max_dimension);
        preview_by_frame.insert(
            frame_number,
            image.resize_exact(preview_width, preview_height, FilterType::Triangle),
        );
        staged.insert(frame_number, stage_path);
        Ok(())
    })?;

    let mut files = Vec::with_capacity(selection.len());
    let mut previews = Vec::with_capacity(selection.len());
    let mut first_use: HashMap<u64, PathBuf> = HashMap::new();
    let mut skipped = 0_usize;

    for frame_number in selection {
        let Some(preview) = preview_by_frame.get(frame_number) else {
            log::warn!("Frame {frame_number} failed to decode; skipping");
            skipped += 1;
            continue;
        };

        let file_path = output_dir.join(format!("frame_{:04}.jpg", files.len()));
        if let Some(stage_path) = staged.remove(frame_number) {
            fs::rename(&stage_path, &file_path)?;
            first_use.insert(*frame_number, file_path.clone());
        } else if let Some(first_path) = first_use.get(frame_number) {
            // Duplicate selection entry: copy the already-finalized file.
            fs::copy(first_path, &file_path)?;
        } else {
            skipped += 1;
            continue;
        }

        previews.push(preview.clone());
        files.push(file_path);
    }

    log::info!(
        "Saved {} frame(s), skipped {} (dir={})",
        files.len(),
        skipped,
        output_dir.display()
    );

    Ok(ExtractedFrames {
        files,
        previews,
        skipped,
        output_dir,
    })
}

/// Write an image as JPEG at the given quality.
fn save_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), ReelError> {
    let file = fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    image.write_with_encoder(encoder)?;
    Ok(())
}

/// Compute dimensions that fit within `max_dimension` preserving aspect ratio.
pub(crate) fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_dimension, max_dimension);
    }
    if width.max(height) <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / width.max(height) as f64;
    let new_width = ((width as f64) * scale).round() as u32;
    let new_height = ((height as f64) * scale).round() as u32;
    (new_width.max(1), new_height.max(1))
}
