//! Media type lookup by file extension.
//!
//! Only the extension is consulted; file contents are never sniffed. The table
//! covers the `text/markdown` and `text/plain` families plus the common
//! document and image types users drop by accident.

use camino::Utf8Path;

const MEDIA_TYPES: &[(&str, &str)] = &[
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("conf", "text/plain"),
    ("def", "text/plain"),
    ("list", "text/plain"),
    ("log", "text/plain"),
    ("in", "text/plain"),
    ("ini", "text/plain"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("rtf", "application/rtf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("zip", "application/zip"),
];

/// Media type for `path` based on its extension, if known.
pub fn lookup(path: &Utf8Path) -> Option<&'static str> {
    let extension = path.extension()?.to_ascii_lowercase();
    MEDIA_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, media_type)| *media_type)
}

/// Whether `path` should be handed to the engine at all.
pub fn is_markdown_candidate(path: &Utf8Path) -> bool {
    matches!(lookup(path), Some("text/markdown") | Some("text/plain"))
}
