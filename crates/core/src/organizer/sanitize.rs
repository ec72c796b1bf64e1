//! Library path construction.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

const MAX_COMPONENT_CHARS: usize = 200;

static FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Make a string safe to use as a single path component.
///
/// Forbidden characters become `_`, whitespace runs collapse to one space,
/// leading and trailing dots are stripped, and the result is capped at 200
/// characters. Returns "Unknown" when nothing is left.
pub fn sanitize_component(name: &str) -> String {
    let replaced = FORBIDDEN.replace_all(name, "_");
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    let is_edge = |c: char| c == '.' || c.is_whitespace();

    let capped: String = collapsed
        .trim_matches(is_edge)
        .chars()
        .take(MAX_COMPONENT_CHARS)
        .collect();
    let out = capped.trim_matches(is_edge).to_string();

    if out.is_empty() {
        "Unknown".to_string()
    } else {
        out
    }
}

/// `{root}/{author}/{title}` with "Unknown Author" / "Unknown Title" fallbacks.
pub fn library_dir(root: &Path, author: Option<&str>, title: &str) -> PathBuf {
    let author = author
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("Unknown Author");
    let title = if title.trim().is_empty() {
        "Unknown Title"
    } else {
        title
    };
    root.join(sanitize_component(author))
        .join(sanitize_component(title))
}

/// `{root}/{author}/{title}/{title}.{ext}`.
pub fn library_file(root: &Path, author: Option<&str>, title: &str, extension: &str) -> PathBuf {
    let dir = library_dir(root, author, title);
    let stem = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown Title".to_string());
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        dir.join(stem)
    } else {
        dir.join(format!("{}.{}", stem, extension))
    }
}
