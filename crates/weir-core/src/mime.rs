//! MIME classification: extension tables, byte-signature sniffing, and the
//! MIME-group vocabulary used for allow-listing.
//!
//! Classification is best-effort and never fails: anything unrecognized
//! falls back to `application/octet-stream` / `.bin`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

/// MIME type to known extensions, preferred extension first.
const MIME_TO_EXTENSIONS: &[(&str, &[&str])] = &[
    // Images
    ("image/jpeg", &[".jpg", ".jpeg", ".jfif"]),
    ("image/png", &[".png"]),
    ("image/gif", &[".gif"]),
    ("image/webp", &[".webp"]),
    ("image/bmp", &[".bmp"]),
    ("image/avif", &[".avif"]),
    ("image/svg+xml", &[".svg"]),
    ("image/x-icon", &[".ico"]),
    ("image/tiff", &[".tif", ".tiff"]),
    // Video
    ("video/mp4", &[".mp4", ".m4v"]),
    ("video/webm", &[".webm"]),
    ("video/x-matroska", &[".mkv"]),
    ("video/x-msvideo", &[".avi"]),
    ("video/quicktime", &[".mov"]),
    ("video/mpeg", &[".mpg", ".mpeg"]),
    ("video/mp2t", &[".ts"]),
    // Audio
    ("audio/mpeg", &[".mp3"]),
    ("audio/wav", &[".wav"]),
    ("audio/ogg", &[".ogg", ".oga"]),
    ("audio/flac", &[".flac"]),
    ("audio/aac", &[".aac"]),
    ("audio/mp4", &[".m4a"]),
    ("audio/opus", &[".opus"]),
    // Documents
    ("application/pdf", &[".pdf"]),
    ("application/msword", &[".doc"]),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        &[".docx"],
    ),
    ("application/vnd.ms-excel", &[".xls"]),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &[".xlsx"],
    ),
    ("application/vnd.ms-powerpoint", &[".ppt"]),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        &[".pptx"],
    ),
    ("application/epub+zip", &[".epub"]),
    // Text
    ("text/plain", &[".txt"]),
    ("text/html", &[".html", ".htm"]),
    ("text/css", &[".css"]),
    ("text/csv", &[".csv"]),
    ("text/javascript", &[".js"]),
    ("text/markdown", &[".md"]),
    ("application/json", &[".json"]),
    ("application/xml", &[".xml"]),
    // Archives and binaries
    ("application/zip", &[".zip"]),
    ("application/gzip", &[".gz"]),
    ("application/x-tar", &[".tar"]),
    ("application/x-7z-compressed", &[".7z"]),
    ("application/vnd.rar", &[".rar"]),
    ("application/x-msdownload", &[".exe", ".dll"]),
    ("application/octet-stream", &[".bin"]),
];

/// Inverted extension to MIME lookup; the first mapping for an extension wins.
static EXTENSION_TO_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (mime, extensions) in MIME_TO_EXTENSIONS {
        for ext in *extensions {
            map.entry(*ext).or_insert(*mime);
        }
    }
    map
});

/// MIME types in the `document` group.
const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/epub+zip",
];

/// MIME types in the `executable` group.
const EXECUTABLE_TYPES: &[&str] = &[
    "application/x-msdownload",
    "application/x-executable",
    "application/x-sh",
    "application/x-dosexec",
    "application/x-elf",
    "application/vnd.microsoft.portable-executable",
    "application/x-mach-binary",
];

/// Named MIME groups usable in `allowed_mime_groups`.
pub const MIME_GROUP_NAMES: &[&str] = &["image", "video", "audio", "text", "document", "executable"];

/// Whether `name` is a recognized MIME group.
pub fn is_known_group(name: &str) -> bool {
    MIME_GROUP_NAMES.contains(&name)
}

/// Whether `mime` belongs to the named group.
pub fn group_contains(group: &str, mime: &str) -> bool {
    match group {
        "image" => mime.starts_with("image/"),
        "video" => mime.starts_with("video/"),
        "audio" => mime.starts_with("audio/"),
        "text" => mime.starts_with("text/"),
        "document" => DOCUMENT_TYPES.contains(&mime),
        "executable" => EXECUTABLE_TYPES.contains(&mime),
        _ => false,
    }
}

/// Whether the MIME type is an image type.
pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Preferred extension for a MIME type, if known.
pub fn preferred_extension(mime: &str) -> Option<&'static str> {
    MIME_TO_EXTENSIONS
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, extensions)| extensions[0])
}

/// MIME for a lowercase dotted extension, if known.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    EXTENSION_TO_MIME.get(ext).copied()
}

/// Sniffs the MIME type from leading magic bytes.
///
/// Covers the media and container formats worth persisting; returns `None`
/// for anything else.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }

    // GIF: GIF87a or GIF89a
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    // RIFF containers: WebP, WAV, AVI
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        return match &data[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wav"),
            b"AVI " => Some("video/x-msvideo"),
            _ => None,
        };
    }

    // BMP: BM
    if data.starts_with(b"BM") {
        return Some("image/bmp");
    }

    // ISO base media (MP4 family): "ftyp" brand at offset 4
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return match &data[8..12] {
            b"avif" => Some("image/avif"),
            b"M4A " => Some("audio/mp4"),
            _ => Some("video/mp4"),
        };
    }

    // Matroska/WebM EBML header
    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("video/webm");
    }

    // Ogg: OggS
    if data.starts_with(b"OggS") {
        return Some("audio/ogg");
    }

    // FLAC: fLaC
    if data.starts_with(b"fLaC") {
        return Some("audio/flac");
    }

    // MP3: ID3 tag or common frame-sync bytes
    if data.starts_with(b"ID3") || matches!([data[0], data[1]], [0xFF, 0xFB] | [0xFF, 0xF3] | [0xFF, 0xF2]) {
        return Some("audio/mpeg");
    }

    // PDF: %PDF
    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }

    // ZIP: PK 03 04 (also the OOXML/EPUB container; plain zip is the safe answer)
    if data.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return Some("application/zip");
    }

    // GZIP: 1F 8B
    if data.starts_with(&[0x1F, 0x8B]) {
        return Some("application/gzip");
    }

    None
}

/// Derives a `(mime, extension)` pair for a response body.
///
/// Resolution order, first match wins: recognized URL path extension, byte
/// signatures, the `content-type` header stripped of parameters, then
/// `application/octet-stream` / `.bin`. Always returns a concrete pair.
pub fn classify(body: &[u8], content_type: Option<&str>, url: &str) -> (String, String) {
    if let Some(ext) = url_extension(url) {
        if let Some(mime) = mime_for_extension(&ext) {
            debug!(%ext, %mime, "classified from URL extension");
            return (mime.to_string(), ext);
        }
    }

    if let Some(mime) = sniff_mime(body) {
        let ext = preferred_extension(mime).unwrap_or(".bin");
        debug!(%mime, "classified from byte signature");
        return (mime.to_string(), ext.to_string());
    }

    if let Some(header) = content_type {
        let mime = header.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if !mime.is_empty() {
            let ext = preferred_extension(&mime).unwrap_or(".bin");
            debug!(%mime, "classified from content-type header");
            return (mime, ext.to_string());
        }
    }

    debug!("no classification, falling back to octet-stream");
    ("application/octet-stream".to_string(), ".bin".to_string())
}

/// Lowercase dotted extension of the URL path, if it has a plausible one.
fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let base = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn classifies_from_url_extension_first() {
        // The body is PNG but the URL says jpg; the URL wins.
        let (mime, ext) = classify(PNG_MAGIC, None, "https://cdn.example.com/pics/cat.JPG?w=300");
        assert_eq!(mime, "image/jpeg");
        assert_eq!(ext, ".jpg");
    }

    #[test]
    fn sniffs_when_url_has_no_extension() {
        let (mime, ext) = classify(PNG_MAGIC, None, "https://example.com/render");
        assert_eq!(mime, "image/png");
        assert_eq!(ext, ".png");
    }

    #[test]
    fn falls_back_to_content_type_header() {
        let (mime, ext) = classify(
            b"plain old text",
            Some("text/plain; charset=utf-8"),
            "https://example.com/notes",
        );
        assert_eq!(mime, "text/plain");
        assert_eq!(ext, ".txt");
    }

    #[test]
    fn final_fallback_is_octet_stream() {
        let (mime, ext) = classify(b"\x00\x01\x02\x03", None, "https://example.com/blob");
        assert_eq!(mime, "application/octet-stream");
        assert_eq!(ext, ".bin");
    }

    #[test]
    fn sniffs_riff_containers() {
        let mut webp = b"RIFF\x00\x00\x00\x00WEBP".to_vec();
        webp.extend_from_slice(b"VP8 ");
        assert_eq!(sniff_mime(&webp), Some("image/webp"));

        let wav = b"RIFF\x24\x00\x00\x00WAVEfmt ";
        assert_eq!(sniff_mime(wav), Some("audio/wav"));
    }

    #[test]
    fn sniffs_mp4_brands() {
        let mp4 = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00";
        assert_eq!(sniff_mime(mp4), Some("video/mp4"));

        let m4a = b"\x00\x00\x00\x20ftypM4A \x00\x00\x00\x00";
        assert_eq!(sniff_mime(m4a), Some("audio/mp4"));
    }

    #[test]
    fn short_bodies_do_not_sniff() {
        assert_eq!(sniff_mime(b"BM"), None);
    }

    #[test]
    fn groups_match_by_prefix_or_list() {
        assert!(group_contains("image", "image/jpeg"));
        assert!(group_contains("video", "video/x-matroska"));
        assert!(group_contains("document", "application/pdf"));
        assert!(group_contains("executable", "application/x-dosexec"));
        assert!(!group_contains("image", "application/pdf"));
        assert!(!group_contains("bogus", "image/jpeg"));
    }

    #[test]
    fn known_groups() {
        assert!(is_known_group("image"));
        assert!(!is_known_group("archive"));
    }

    #[test]
    fn url_extension_ignores_query_and_long_suffixes() {
        assert_eq!(url_extension("https://a.b/c/d.png?x=1#frag"), Some(".png".into()));
        assert_eq!(url_extension("https://a.b/c/.hidden"), None);
        assert_eq!(url_extension("https://a.b/c/d"), None);
        assert_eq!(url_extension("https://a.b/archive.backup01234"), None);
    }
}
