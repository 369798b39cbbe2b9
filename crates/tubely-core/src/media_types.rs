//! Supported media types and the file extensions derived from them.
//!
//! Extensions always come from the validated media type, never from a
//! client-supplied filename.

pub const VIDEO_MP4: &str = "video/mp4";
pub const IMAGE_JPEG: &str = "image/jpeg";
pub const IMAGE_PNG: &str = "image/png";

/// Strip parameters and lowercase: `"Video/MP4; codecs=avc1"` -> `"video/mp4"`.
pub fn normalize(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Extension for a supported media type, `None` for anything else.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match normalize(content_type).as_str() {
        VIDEO_MP4 => Some("mp4"),
        IMAGE_JPEG => Some("jpeg"),
        IMAGE_PNG => Some("png"),
        _ => None,
    }
}

/// Inverse of [`extension_for`].
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "mp4" => Some(VIDEO_MP4),
        "jpeg" | "jpg" => Some(IMAGE_JPEG),
        "png" => Some(IMAGE_PNG),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_parameters() {
        assert_eq!(normalize("Video/MP4; codecs=\"avc1\""), "video/mp4");
        assert_eq!(normalize("  image/png "), "image/png");
    }

    #[test]
    fn test_extension_for_supported_types() {
        assert_eq!(extension_for("video/mp4"), Some("mp4"));
        assert_eq!(extension_for("image/jpeg"), Some("jpeg"));
        assert_eq!(extension_for("image/png;q=1"), Some("png"));
        assert_eq!(extension_for("image/gif"), None);
        assert_eq!(extension_for(""), None);
    }

    #[test]
    fn test_media_type_for_extension() {
        assert_eq!(media_type_for_extension("JPG"), Some(IMAGE_JPEG));
        assert_eq!(media_type_for_extension("png"), Some(IMAGE_PNG));
        assert_eq!(media_type_for_extension("webm"), None);
    }
}
