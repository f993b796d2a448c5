//! MIME type detection module
//!
//! Returns the Content-Type for a file, consulting caller overrides before
//! the built-in extension table.

use std::collections::HashMap;
use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content-Type for `path`: overrides first, then the table, then binary
///
/// Override keys are extensions with or without the leading dot and are
/// matched case-insensitively.
pub fn content_type_for<'a>(path: &Path, overrides: &'a HashMap<String, String>) -> &'a str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return OCTET_STREAM;
    };
    let ext = ext.to_ascii_lowercase();

    let custom = overrides.iter().find(|(key, _)| {
        key.trim_start_matches('.').eq_ignore_ascii_case(&ext)
    });
    if let Some((_, value)) = custom {
        return value;
    }

    get_content_type(Some(&ext))
}

/// Get MIME Content-Type based on a lowercase file extension
///
/// # Examples
/// ```
/// use assetbridge::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("html")), "text/html; charset=utf-8");
/// assert_eq!(get_content_type(Some("mp4")), "video/mp4");
/// assert_eq!(get_content_type(None), "application/octet-stream");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        // Text
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("xml") => "application/xml",

        // Scripts and data
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("wasm") => "application/wasm",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",

        // Video
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogv") => "video/ogg",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",

        // Audio
        Some("mp3") => "audio/mpeg",
        Some("ogg" | "oga") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Archives and documents
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",

        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        assert_eq!(get_content_type(Some("html")), "text/html; charset=utf-8");
        assert_eq!(get_content_type(Some("png")), "image/png");
        assert_eq!(get_content_type(Some("mp4")), "video/mp4");
    }

    #[test]
    fn test_unknown_extension() {
        let none = HashMap::new();
        assert_eq!(content_type_for(Path::new("a.xyz"), &none), OCTET_STREAM);
        assert_eq!(content_type_for(Path::new("Makefile"), &none), OCTET_STREAM);
    }

    #[test]
    fn test_case_insensitive_extension() {
        let none = HashMap::new();
        assert_eq!(content_type_for(Path::new("CLIP.MP4"), &none), "video/mp4");
    }

    #[test]
    fn test_override_wins() {
        let mut overrides = HashMap::new();
        overrides.insert(".mp4".to_string(), "application/x-custom".to_string());
        overrides.insert("dat".to_string(), "application/x-data".to_string());

        assert_eq!(
            content_type_for(Path::new("v.mp4"), &overrides),
            "application/x-custom"
        );
        assert_eq!(
            content_type_for(Path::new("blob.DAT"), &overrides),
            "application/x-data"
        );
        assert_eq!(content_type_for(Path::new("x.css"), &overrides), "text/css; charset=utf-8");
    }
}
