//! Frame selection policies.
//!
//! This module decides *which* frames of a video to extract. The `Uniform`
//! and `Interval` policies are pure functions of the frame count; the
//! `ChangeDetection` policy needs pixel data and performs one sequential
//! decode pass over the whole stream.

use std::fmt::{Display, Formatter, Result as FmtResult};

use clap::ValueEnum;

use crate::{error::ReelError, media::VideoSource};

/// Number of differing pixels between consecutive frames above which a frame
/// is considered a change candidate. Overridable via
/// [`ExtractOptions::with_change_threshold`](crate::ExtractOptions::with_change_threshold).
pub const DEFAULT_CHANGE_THRESHOLD: u64 = 1000;

/// How to choose which frames to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SamplingPolicy {
    /// Spread the selection evenly across the full timeline:
    /// index `i` maps to `i * total_frames / requested_count`.
    #[default]
    Uniform,
    /// Fixed stride of `total_frames / requested_count` starting at frame 0.
    Interval,
    /// Keep frames whose pixel difference against the previous frame exceeds
    /// a threshold, in temporal order. Decodes the entire video once.
    ChangeDetection,
}

impl Display for SamplingPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            SamplingPolicy::Uniform => "uniform",
            SamplingPolicy::Interval => "interval",
            SamplingPolicy::ChangeDetection => "change-detection",
        };
        f.write_str(name)
    }
}

/// Select frame indices by policy, without decoding.
///
/// Returns 0-based frame numbers in non-decreasing order, at most
/// `requested_count` of them, all below `total_frames`.
///
/// - `Uniform` may repeat indices when `requested_count > total_frames`;
///   coverage of the timeline stays even.
/// - `Interval` requires `requested_count <= total_frames` so the stride is
///   at least 1; a degenerate stride is a typed error rather than a silently
///   broken selection.
///
/// # Errors
///
/// [`ReelError::InvalidSampleCount`] when `requested_count` or `total_frames`
/// is zero, or when `Interval` cannot produce a positive stride.
/// [`ReelError::SelectionNeedsVideo`] for [`SamplingPolicy::ChangeDetection`],
/// which cannot be computed from counts alone — use
/// [`select_change_frames`] with an opened source instead.
///
/// # Example
///
/// ```
/// use reelkit::{SamplingPolicy, select_frames};
///
/// let indices = select_frames(100, 4, SamplingPolicy::Uniform).unwrap();
/// assert_eq!(indices, vec![0, 25, 50, 75]);
/// ```
pub fn select_frames(
    total_frames: u64,
    requested_count: u64,
    policy: SamplingPolicy,
) -> Result<Vec<u64>, ReelError> {
    if requested_count == 0 || total_frames == 0 {
        return Err(ReelError::InvalidSampleCount {
            requested_count,
            total_frames,
        });
    }

    match policy {
        SamplingPolicy::Uniform => Ok((0..requested_count)
            .map(|i| i * total_frames / requested_count)
            .collect()),
        SamplingPolicy::Interval => {
            let stride = total_frames / requested_count;
            if stride == 0 {
                return Err(ReelError::InvalidSampleCount {
                    requested_count,
                    total_frames,
                });
            }
            Ok((0..requested_count).map(|i| i * stride).collect())
        }
        SamplingPolicy::ChangeDetection => Err(ReelError::SelectionNeedsVideo {
            policy: policy.to_string(),
        }),
    }
}

/// Select up to `requested_count` change frames from a video.
///
/// Decodes every frame sequentially, computing the absolute per-channel
/// difference against the previous frame. A frame is a candidate when the
/// number of pixels with any differing channel exceeds `threshold`.
/// Candidates are kept in temporal order and the pass stops as soon as
/// enough have been found.
///
/// This is O(total_frames) in full-frame decodes regardless of
/// `requested_count` — the only expensive selection path.
pub fn select_change_frames(
    source: &mut VideoSource,
    requested_count: u64,
    threshold: u64,
) -> Result<Vec<u64>, ReelError> {
    if requested_count == 0 {
        return Err(ReelError::InvalidSampleCount {
            requested_count,
            total_frames: source.metadata().frame_count,
        });
    }

    log::debug!(
        "Running change-detection pass (threshold={threshold}, requested={requested_count})"
    );

    let mut previous: Option<Vec<u8>> = None;
    let mut candidates: Vec<u64> = Vec::new();

    source.decode_sequential(|frame_number, buffer| {
        if let Some(prev) = &previous {
            if changed_pixels(prev, buffer) > threshold {
                candidates.push(frame_number);
            }
        }
        previous = Some(buffer.to_vec());
        Ok(candidates.len() < requested_count as usize)
    })?;

    log::debug!("Change-detection pass found {} candidate(s)", candidates.len());

    Ok(candidates)
}

/// Count pixels whose RGB values differ between two packed RGB24 buffers.
fn changed_pixels(previous: &[u8], current: &[u8]) -> u64 {
    previous
        .chunks_exact(3)
        .zip(current.chunks_exact(3))
        .filter(|(a, b)| a != b)
        .count() as u64
}
