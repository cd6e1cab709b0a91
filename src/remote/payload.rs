//! Media payload preparation.
//!
//! Local media files are embedded into the request body as base64 `data:`
//! URIs. Each media kind carries a hard size ceiling, checked **before** any
//! network traffic; audio additionally gets truncated to
//! [`MAX_AUDIO_SECONDS`] when the source clip runs longer.

use std::{fmt, fs, path::Path};

use base64::Engine;

use crate::error::ReelError;

/// Maximum embeddable image size in bytes (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum embeddable audio size in bytes (15 MiB).
pub const MAX_AUDIO_BYTES: u64 = 15 * 1024 * 1024;

/// Maximum embeddable video size in bytes (10 MiB).
pub const MAX_VIDEO_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum audio duration accepted by the remote API, in seconds.
pub const MAX_AUDIO_SECONDS: u64 = 30;

/// Kind of media being embedded, with its size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image (driving frame or keyframe).
    Image,
    /// Audio clip.
    Audio,
    /// Video clip.
    Video,
}

impl MediaKind {
    /// Size ceiling for embedding this kind, in bytes.
    pub fn size_limit(self) -> u64 {
        match self {
            MediaKind::Image => MAX_IMAGE_BYTES,
            MediaKind::Audio => MAX_AUDIO_BYTES,
            MediaKind::Video => MAX_VIDEO_BYTES,
        }
    }

    /// Fallback MIME type when the file extension is unrecognized.
    fn default_mime(self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Video => "video/mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        };
        f.write_str(name)
    }
}

/// Resolve a media reference into a form the request body can carry.
///
/// - `http://`, `https://`, and `data:` references pass through untouched.
/// - Anything else is treated as a local file path: it must exist, must fit
///   under the kind's size ceiling, and is embedded as a base64 `data:` URI.
/// - Audio files longer than [`MAX_AUDIO_SECONDS`] are truncated to a
///   scratch WAV first; the ceiling applies to the truncated file.
///
/// # Errors
///
/// [`ReelError::InputNotFound`] for a missing local file and
/// [`ReelError::MediaTooLarge`] for one over the ceiling — both raised
/// before any network call.
pub fn encode_media(reference: &str, kind: MediaKind) -> Result<String, ReelError> {
    if reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("data:")
    {
        return Ok(reference.to_string());
    }

    let mut path = Path::new(reference).to_path_buf();
    if !path.is_file() {
        return Err(ReelError::InputNotFound { path });
    }

    if kind == MediaKind::Audio {
        let duration = crate::audio::duration_seconds(&path)?;
        if duration > MAX_AUDIO_SECONDS as f64 {
            log::warn!(
                "Audio {} runs {duration:.1}s, over the {MAX_AUDIO_SECONDS}s limit; truncating",
                path.display()
            );
            path = crate::audio::truncate_to_wav(&path, MAX_AUDIO_SECONDS)?;
        }
    }

    let size = fs::metadata(&path)?.len();
    let limit = kind.size_limit();
    if size > limit {
        return Err(ReelError::MediaTooLarge {
            kind,
            path,
            size,
            limit,
        });
    }

    let bytes = fs::read(&path)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let mime = mime_for(&path, kind);

    log::debug!(
        "Embedded {} {} ({size} bytes) as {mime} data URI",
        kind,
        path.display()
    );

    Ok(format!("data:{mime};base64,{encoded}"))
}

/// Guess the MIME type from the file extension, falling back per kind.
fn mime_for(path: &Path, kind: MediaKind) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        _ => kind.default_mime(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn remote_urls_pass_through() {
        let url = "https://example.com/frame.jpg";
        assert_eq!(encode_media(url, MediaKind::Image).unwrap(), url);
        let data = "data:image/png;base64,AAAA";
        assert_eq!(encode_media(data, MediaKind::Image).unwrap(), data);
    }

    #[test]
    fn missing_file_is_a_typed_error() {
        let error = encode_media("/nonexistent/frame.jpg", MediaKind::Image).unwrap_err();
        assert!(matches!(error, ReelError::InputNotFound { .. }));
    }

    #[test]
    fn small_file_becomes_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        fs::File::create(&path)
            .unwrap()
            .write_all(&[0x89, 0x50, 0x4e, 0x47])
            .unwrap();

        let encoded = encode_media(path.to_str().unwrap(), MediaKind::Image).unwrap();
        assert!(encoded.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.mp4");
        let file = fs::File::create(&path).unwrap();
        file.set_len(MAX_VIDEO_BYTES + 1).unwrap();

        let error = encode_media(path.to_str().unwrap(), MediaKind::Video).unwrap_err();
        match error {
            ReelError::MediaTooLarge { kind, size, limit, .. } => {
                assert_eq!(kind, MediaKind::Video);
                assert_eq!(size, MAX_VIDEO_BYTES + 1);
                assert_eq!(limit, MAX_VIDEO_BYTES);
            }
            other => panic!("expected MediaTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn mime_falls_back_per_kind() {
        assert_eq!(mime_for(Path::new("x.unknown"), MediaKind::Audio), "audio/mpeg");
        assert_eq!(mime_for(Path::new("x.mov"), MediaKind::Video), "video/quicktime");
    }
}
