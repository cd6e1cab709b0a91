//! Audio duration probing and truncation.
//!
//! The remote video API accepts at most [`MAX_AUDIO_SECONDS`](crate::remote::payload::MAX_AUDIO_SECONDS)
//! seconds of audio per request. Longer clips are decoded, cut at the limit,
//! and re-encoded as 16-bit PCM WAV before embedding.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    ChannelLayout, Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    media::Type,
    software::resampling::Context as ResamplingContext,
};

use crate::error::ReelError;

/// Probe the duration of an audio file in seconds.
///
/// Uses the container-level duration, which is cheap and accurate enough for
/// the truncation decision.
pub(crate) fn duration_seconds<P: AsRef<Path>>(path: P) -> Result<f64, ReelError> {
    let path = path.as_ref();

    ffmpeg_next::init().map_err(|error| ReelError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    let input_context = ffmpeg_next::format::input(&path).map_err(|error| ReelError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    input_context
        .streams()
        .best(Type::Audio)
        .ok_or(ReelError::NoAudioStream)?;

    let duration_microseconds = input_context.duration();
    if duration_microseconds > 0 {
        Ok(duration_microseconds as f64 / 1_000_000.0)
    } else {
        Ok(0.0)
    }
}

/// Decode the first `max_seconds` of an audio file and write them as a
/// 16-bit mono PCM WAV scratch file under the system temp directory.
///
/// Returns the path of the truncated file. The decode loop resamples to
/// mono f32 and stops as soon as the sample budget is exhausted.
pub(crate) fn truncate_to_wav<P: AsRef<Path>>(
    path: P,
    max_seconds: u64,
) -> Result<PathBuf, ReelError> {
    let path = path.as_ref();

    log::info!(
        "Truncating audio {} to {max_seconds}s before embedding",
        path.display()
    );

    ffmpeg_next::init().map_err(|error| ReelError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    let mut input_context =
        ffmpeg_next::format::input(&path).map_err(|error| ReelError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

    let audio_stream_index = input_context
        .streams()
        .best(Type::Audio)
        .map(|stream| stream.index())
        .ok_or(ReelError::NoAudioStream)?;

    let stream = input_context
        .stream(audio_stream_index)
        .ok_or(ReelError::NoAudioStream)?;
    let codec_parameters = stream.parameters();
    let decoder_context = CodecContext::from_parameters(codec_parameters)?;
    let mut decoder = decoder_context.decoder().audio().map_err(|error| {
        ReelError::AudioDecodeError(format!("Failed to create audio decoder: {error}"))
    })?;

    let sample_rate = decoder.rate();
    let max_samples = sample_rate as u64 * max_seconds;

    let mut resampler = ResamplingContext::get(
        decoder.format(),
        decoder.channel_layout(),
        sample_rate,
        Sample::F32(SampleType::Packed),
        ChannelLayout::MONO,
        sample_rate,
    )
    .map_err(|error| {
        ReelError::AudioDecodeError(format!("Failed to create resampler: {error}"))
    })?;

    let output_path = truncated_path(path);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&output_path, spec)?;

    let mut decoded_frame = AudioFrame::empty();
    let mut resampled_frame = AudioFrame::empty();
    let mut samples_written: u64 = 0;
    let mut eof_sent = false;

    'decode: loop {
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            resampler
                .run(&decoded_frame, &mut resampled_frame)
                .map_err(|error| {
                    ReelError::AudioDecodeError(format!("Resample error: {error}"))
                })?;

            let data = resampled_frame.data(0);
            let sample_count = resampled_frame.samples();
            let float_samples: &[f32] =
                unsafe { std::slice::from_raw_parts(data.as_ptr() as *const f32, sample_count) };

            for &sample in float_samples {
                if samples_written >= max_samples {
                    break 'decode;
                }
                let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(quantized)?;
                samples_written += 1;
            }
        }

        if eof_sent {
            break;
        }

        let mut packet = Packet::empty();
        match packet.read(&mut input_context) {
            Ok(()) => {
                if packet.stream() as usize == audio_stream_index {
                    decoder
                        .send_packet(&packet)
                        .map_err(|error| ReelError::AudioDecodeError(error.to_string()))?;
                }
            }
            Err(FfmpegError::Eof) => {
                decoder
                    .send_eof()
                    .map_err(|error| ReelError::AudioDecodeError(error.to_string()))?;
                eof_sent = true;
            }
            Err(_) => {
                // Non-fatal read error — try the next packet.
            }
        }
    }

    writer.finalize()?;

    log::debug!(
        "Wrote {} truncated samples ({} Hz) to {}",
        samples_written,
        sample_rate,
        output_path.display()
    );

    Ok(output_path)
}

/// Scratch path for the truncated copy, under the system temp directory.
/// The pid keeps concurrent processes off each other's files.
fn truncated_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    std::env::temp_dir().join(format!("{stem}_truncated_{}.wav", std::process::id()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::truncated_path;

    #[test]
    fn truncated_path_lands_in_temp_dir() {
        let out = truncated_path(Path::new("/media/clips/voice.mp3"));
        assert_eq!(out.parent(), Some(std::env::temp_dir().as_path()));

        let name = out.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("voice_truncated_"));
        assert!(name.ends_with(".wav"));
    }

    #[test]
    fn truncated_path_without_extension_or_stem() {
        let out = truncated_path(Path::new("voice"));
        let name = out.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("voice_truncated_"));
    }
}
