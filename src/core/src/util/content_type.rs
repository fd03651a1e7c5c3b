//! Extension → MIME mapping (§6 "Content-type mapping"). Text types carry
//! a configurable fallback charset rather than a hardcoded `gbk` — see
//! design note (d).

const DEFAULT_MIME: &str = "application/octet-stream";

fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Resolve the base MIME type for `filename`'s extension, without a
/// charset suffix.
pub fn mime_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("txt") => "text/plain",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("mp3") => "audio/mpeg",
        Some("mpeg") => "video/mpeg",
        Some("mp4") => "video/mp4",
        Some("jpeg") | Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => DEFAULT_MIME,
    }
}

pub fn is_text(filename: &str) -> bool {
    mime_for(filename).starts_with("text/")
}

/// Full `Content-Type` header value, attaching `charset` to text types.
pub fn content_type_header(filename: &str, text_charset: &str) -> String {
    let mime = mime_for(filename);
    if mime.starts_with("text/") {
        format!("{mime}; charset={text_charset}")
    } else {
        mime.to_string()
    }
}
