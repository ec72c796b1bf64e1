//! File formats the library knows about.

use std::path::Path;

pub const EBOOK_EXTENSIONS: &[&str] = &[
    "epub", "mobi", "azw", "azw3", "pdf", "txt", "rtf", "fb2", "lit",
];

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "m4b", "flac", "ogg", "wav", "aac", "opus"];

fn has_extension(path: &Path, known: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| known.iter().any(|k| e.eq_ignore_ascii_case(k)))
        .unwrap_or(false)
}

pub fn is_ebook_file(path: &Path) -> bool {
    has_extension(path, EBOOK_EXTENSIONS)
}

pub fn is_audio_file(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}
