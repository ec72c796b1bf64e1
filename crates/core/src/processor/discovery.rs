//! Locating a finished download on disk.
//!
//! Download clients rename and nest jobs freely, so the file is found by
//! walking the downloads root and matching names against the release. Match
//! order, first hit wins:
//! 1. file name (without extension) equal to the release title
//! 2. client job id in the path
//! 3. release title as a substring of the file name
//! 4. at least two of the first five title words among the file's words
//! 5. one of the first three title words (longer than 3 chars) inside the file name
//! 6. at least two title words in the name of a directory holding audio files
//! 7. the directory with the most audio files
//!
//! Ebook matches return the file; audio matches return the containing directory.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::organizer::{is_audio_file, is_ebook_file};

const TITLE_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "in", "on", "at", "to", "for",
];

const FILE_STOP_WORDS: &[&str] = &[
    "ch", "chapter", "part", "ep", "episode", "the", "a", "an", "and", "or", "of",
];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Downloads root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("Could not find downloaded file for release_title: {0}")]
    NotFound(String),
}

/// Split a name into lowercase words on whitespace and `.`, `_`, `-`.
fn words(name: &str) -> Vec<String> {
    name.to_lowercase()
        .replace(['.', '_', '-'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Significant words of a release title, in order.
fn title_words(title: &str) -> Vec<String> {
    words(title)
        .into_iter()
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !TITLE_STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn name_words(name: &str) -> HashSet<String> {
    words(name)
        .into_iter()
        .filter(|w| !FILE_STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn overlap(title: &[String], limit: usize, name: &HashSet<String>) -> usize {
    title.iter().take(limit).filter(|w| name.contains(*w)).count()
}

/// What a matching file resolves to.
fn resolve(path: &Path) -> PathBuf {
    if is_audio_file(path) {
        path.parent().unwrap_or(path).to_path_buf()
    } else {
        path.to_path_buf()
    }
}

/// Find the downloaded artifact for a release under `root`.
pub fn discover(
    root: &Path,
    release_title: &str,
    job_id: Option<&str>,
) -> Result<PathBuf, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::RootMissing(root.to_path_buf()));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut audio_dirs: BTreeMap<PathBuf, usize> = BTreeMap::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        if is_audio_file(&path) {
            if let Some(parent) = path.parent() {
                *audio_dirs.entry(parent.to_path_buf()).or_default() += 1;
            }
            candidates.push(path);
        } else if is_ebook_file(&path) {
            candidates.push(path);
        }
    }

    // Ebooks take precedence over audio within each rule.
    candidates.sort_by_key(|p| is_audio_file(p));

    let title_lower = release_title.trim().to_lowercase();

    if !title_lower.is_empty() {
        if let Some(hit) = candidates.iter().find(|p| stem_of(p) == title_lower) {
            debug!(path = %hit.display(), "Matched download by exact name");
            return Ok(resolve(hit));
        }
    }

    if let Some(job_id) = job_id.filter(|j| !j.is_empty()) {
        if let Some(hit) = candidates.iter().find(|p| {
            p.strip_prefix(root)
                .unwrap_or(p)
                .to_string_lossy()
                .contains(job_id)
        }) {
            debug!(path = %hit.display(), "Matched download by job id");
            return Ok(resolve(hit));
        }
    }

    let title = title_words(release_title);

    if !title_lower.is_empty() {
        if let Some(hit) = candidates.iter().find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_lowercase().contains(&title_lower))
                .unwrap_or(false)
        }) {
            debug!(path = %hit.display(), "Matched download by title");
            return Ok(resolve(hit));
        }
    }

    if let Some(hit) = candidates
        .iter()
        .find(|p| overlap(&title, 5, &name_words(&stem_of(p))) >= 2)
    {
        debug!(path = %hit.display(), "Matched download by word overlap");
        return Ok(resolve(hit));
    }

    if let Some(hit) = candidates.iter().find(|p| {
        let stem = stem_of(p);
        title
            .iter()
            .take(3)
            .any(|w| w.chars().count() > 3 && stem.contains(w.as_str()))
    }) {
        debug!(path = %hit.display(), "Matched download by title word");
        return Ok(resolve(hit));
    }

    if let Some(dir) = audio_dirs.keys().find(|dir| {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        overlap(&title, title.len(), &name_words(&name)) >= 2
    }) {
        debug!(path = %dir.display(), "Matched audiobook directory by name");
        return Ok(dir.clone());
    }

    // Largest audio directory; the first one wins ties.
    let mut largest: Option<(&PathBuf, usize)> = None;
    for (dir, count) in &audio_dirs {
        if largest.map_or(true, |(_, best)| *count > best) {
            largest = Some((dir, *count));
        }
    }
    if let Some((dir, count)) = largest {
        debug!(path = %dir.display(), files = count, "Falling back to largest audio directory");
        return Ok(dir.clone());
    }

    Err(DiscoveryError::NotFound(release_title.to_string()))
}
