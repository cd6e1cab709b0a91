//! Audio embedding integration tests.
//!
//! Input WAVs are generated on the fly with `hound`, so these run without
//! any checked-in fixture; only the FFmpeg system libraries are needed.

use std::{io::Cursor, path::Path};

use base64::Engine;
use reelkit::remote::payload::{MAX_AUDIO_SECONDS, MediaKind, encode_media};

const SAMPLE_RATE: u32 = 8_000;

fn write_sine_wav(path: &Path, seconds: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let total = SAMPLE_RATE * seconds;
    for n in 0..total {
        let t = n as f32 / SAMPLE_RATE as f32;
        let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5 * i16::MAX as f32) as i16;
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize");
}

fn decode_embedded_wav(encoded: &str) -> hound::WavReader<Cursor<Vec<u8>>> {
    let payload = encoded
        .strip_prefix("data:audio/wav;base64,")
        .expect("expected a WAV data URI");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .expect("base64 payload");
    hound::WavReader::new(Cursor::new(bytes)).expect("parse embedded wav")
}

#[test]
fn over_long_audio_is_truncated_to_the_duration_cap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("long_clip.wav");
    write_sine_wav(&input, MAX_AUDIO_SECONDS as u32 + 5);

    let encoded = encode_media(input.to_str().expect("path"), MediaKind::Audio).expect("encode");

    let reader = decode_embedded_wav(&encoded);
    let spec = reader.spec();
    let seconds = reader.duration() as f64 / spec.sample_rate as f64;

    assert_eq!(spec.channels, 1);
    assert!(
        seconds <= MAX_AUDIO_SECONDS as f64 + 0.1,
        "embedded audio runs {seconds:.2}s, over the {MAX_AUDIO_SECONDS}s cap"
    );
    assert!(seconds > (MAX_AUDIO_SECONDS as f64) - 1.0, "truncation cut too much");
}

#[test]
fn short_audio_is_embedded_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("short_clip.wav");
    write_sine_wav(&input, 2);

    let encoded = encode_media(input.to_str().expect("path"), MediaKind::Audio).expect("encode");

    // No truncation pass: the data URI carries the original bytes.
    let original = std::fs::read(&input).expect("read input");
    let payload = encoded
        .strip_prefix("data:audio/wav;base64,")
        .expect("expected a WAV data URI");
    let embedded = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .expect("base64 payload");
    assert_eq!(embedded, original);
}
