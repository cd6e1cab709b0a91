//! Frame extraction integration tests.
//!
//! These exercise the full open → select → materialize pipeline against a
//! real video fixture. They pass trivially when the fixture is absent.

use std::path::Path;

use reelkit::{ExtractOptions, SamplingPolicy, VideoSource, extract_keyframes, extract_selection};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

#[test]
fn uniform_extraction_writes_sequence_named_jpegs() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let mut source = VideoSource::open(path).expect("open");

    let frames = extract_keyframes(&mut source, 4, dir.path(), &ExtractOptions::new())
        .expect("extract");

    assert_eq!(frames.files.len() + frames.skipped, 4);
    assert!(frames.output_dir.starts_with(dir.path()));
    assert!(
        frames
            .output_dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("frames_")),
        "output directory should be timestamped"
    );

    for (index, file) in frames.files.iter().enumerate() {
        let expected = format!("frame_{index:04}.jpg");
        assert_eq!(
            file.file_name().and_then(|name| name.to_str()),
            Some(expected.as_str()),
            "files must be named by sequence position"
        );
        assert!(file.is_file(), "saved frame should exist on disk");
    }
}

#[test]
fn previews_fit_within_bound() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let mut source = VideoSource::open(path).expect("open");

    let options = ExtractOptions::new().with_preview_max_dimension(320);
    let frames = extract_keyframes(&mut source, 2, dir.path(), &options).expect("extract");

    assert_eq!(frames.previews.len(), frames.files.len());
    for preview in &frames.previews {
        assert!(preview.width().max(preview.height()) <= 320);
    }
}

#[test]
fn duplicate_selection_entries_each_produce_a_file() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let mut source = VideoSource::open(path).expect("open");

    // Oversampled uniform selections repeat indices; each entry still gets
    // its own output file.
    let frames = extract_selection(&mut source, &[0, 0, 1], dir.path(), &ExtractOptions::new())
        .expect("extract");
    assert_eq!(frames.files.len() + frames.skipped, 3);
}

#[test]
fn change_detection_extraction_runs() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let mut source = VideoSource::open(path).expect("open");

    let options = ExtractOptions::new().with_policy(SamplingPolicy::ChangeDetection);
    let frames = extract_keyframes(&mut source, 3, dir.path(), &options).expect("extract");

    // Change candidates depend on content; there may be fewer than requested.
    assert!(frames.files.len() <= 3);
}

#[test]
fn metadata_reports_dimensions_and_frames() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = VideoSource::open(path).expect("open");
    let metadata = source.metadata();

    assert!(metadata.width > 0);
    assert!(metadata.height > 0);
    assert!(metadata.frame_count > 0, "expected a nonzero frame count");
}
