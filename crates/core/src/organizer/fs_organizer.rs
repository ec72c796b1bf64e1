//! File system organizer implementation.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use super::error::OrganizerError;
use super::formats::is_audio_file;

const BUFFER_SIZE: usize = 64 * 1024;

/// A file placed in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// False when the destination already was the source.
    pub copied: bool,
}

/// Copies downloads into the library, keeping the source in place.
#[derive(Debug, Clone, Default)]
pub struct FsOrganizer {
    verify_checksum: bool,
}

impl FsOrganizer {
    pub fn new(verify_checksum: bool) -> Self {
        Self { verify_checksum }
    }

    /// Copy a single file to `destination`, creating directories as needed.
    ///
    /// The copy keeps the source's modification time. When `destination` is
    /// the source itself nothing happens.
    pub async fn organize_file(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<OrganizedFile, OrganizerError> {
        let source_meta = fs::metadata(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OrganizerError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                OrganizerError::Io(e)
            }
        })?;

        if same_file(source, destination).await {
            debug!(path = %destination.display(), "Already in library");
            return Ok(OrganizedFile {
                path: destination.to_path_buf(),
                size_bytes: source_meta.len(),
                copied: false,
            });
        }

        ensure_parent(destination).await?;

        let (size_bytes, checksum) = self.copy_file(source, destination).await?;
        preserve_mtime(&source_meta, destination);

        if let Some(expected) = checksum {
            let actual = sha256_file(destination).await?;
            if actual != expected {
                return Err(OrganizerError::ChecksumMismatch {
                    path: destination.to_path_buf(),
                    expected,
                    actual,
                });
            }
        }

        info!(
            source = %source.display(),
            destination = %destination.display(),
            size_bytes,
            "Copied file into library"
        );

        Ok(OrganizedFile {
            path: destination.to_path_buf(),
            size_bytes,
            copied: true,
        })
    }

    /// Copy every audio file directly inside `source_dir` into `destination_dir`.
    ///
    /// Fails when the directory holds no audio files.
    pub async fn organize_directory(
        &self,
        source_dir: &Path,
        destination_dir: &Path,
    ) -> Result<Vec<OrganizedFile>, OrganizerError> {
        if !source_dir.is_dir() {
            return Err(OrganizerError::SourceNotFound {
                path: source_dir.to_path_buf(),
            });
        }

        fs::create_dir_all(destination_dir).await.map_err(|e| {
            OrganizerError::DirectoryCreationFailed {
                path: destination_dir.to_path_buf(),
                source: e,
            }
        })?;

        let mut audio = Vec::new();
        let mut entries = fs::read_dir(source_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && is_audio_file(&path) {
                audio.push(path);
            }
        }
        audio.sort();

        let mut placed = Vec::with_capacity(audio.len());
        for source in audio {
            let Some(name) = source.file_name() else {
                continue;
            };
            match self.organize_file(&source, &destination_dir.join(name)).await {
                Ok(file) => placed.push(file),
                Err(e) => warn!(source = %source.display(), error = %e, "Skipping audio file"),
            }
        }

        if placed.is_empty() {
            return Err(OrganizerError::NoAudioFiles {
                path: source_dir.to_path_buf(),
            });
        }

        info!(
            source = %source_dir.display(),
            destination = %destination_dir.display(),
            files = placed.len(),
            "Copied audiobook into library"
        );
        Ok(placed)
    }

    /// Copies a file, hashing it on the way when verification is enabled.
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(u64, Option<String>), OrganizerError> {
        let copy_failed =
            |e| OrganizerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e);

        let source_file = File::open(source).await.map_err(copy_failed)?;
        let dest_file = File::create(destination).await.map_err(copy_failed)?;

        let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);
        let mut hasher = self.verify_checksum.then(Sha256::new);

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(copy_failed)?;
            if bytes_read == 0 {
                break;
            }
            if let Some(ref mut h) = hasher {
                h.update(&buffer[..bytes_read]);
            }
            writer
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(copy_failed)?;
            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(copy_failed)?;

        Ok((total_bytes, hasher.map(|h| format!("{:x}", h.finalize()))))
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn ensure_parent(path: &Path) -> Result<(), OrganizerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| OrganizerError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    Ok(())
}

fn preserve_mtime(source_meta: &std::fs::Metadata, destination: &Path) {
    let result = source_meta.modified().and_then(|mtime| {
        std::fs::OpenOptions::new()
            .write(true)
            .open(destination)?
            .set_modified(mtime)
    });
    if let Err(e) = result {
        debug!(path = %destination.display(), error = %e, "Could not preserve modification time");
    }
}

async fn sha256_file(path: &Path) -> Result<String, OrganizerError> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, File::open(path).await?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
