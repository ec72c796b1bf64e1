//! Post-processing stages: conversion to the canonical format and library organization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::attempt::{AttemptStore, DownloadAttempt, PostProcessStatus};
use crate::catalog::{CatalogError, MediaCatalog, MediaItem, MediaStatus};
use crate::config::{ConfigResolver, ProcessingConfig};
use crate::converter::{
    canonical_output_path, is_canonical, ConversionJob, EbookConvertConverter, EbookConverter,
};
use crate::metrics;
use crate::organizer::{library_dir, library_file, FsOrganizer};

use super::cover::CoverFetcher;
use super::discovery::discover;
use super::metadata::write_opf;
use super::types::{PostProcessError, StageOutcome};

/// Where organization put things.
struct Organized {
    library_path: PathBuf,
    cover_path: Option<PathBuf>,
}

/// Runs the post-processing stages for download attempts.
///
/// Each stage is independent and safe to repeat. Failures come back as a
/// [`StageOutcome`] and are recorded on the attempt.
pub struct PostProcessor {
    attempts: Arc<dyn AttemptStore>,
    catalog: Arc<dyn MediaCatalog>,
    resolver: Arc<dyn ConfigResolver>,
    /// Overrides the converter built from the processing configuration.
    converter: Option<Arc<dyn EbookConverter>>,
}

impl PostProcessor {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn MediaCatalog>,
        resolver: Arc<dyn ConfigResolver>,
    ) -> Self {
        Self {
            attempts,
            catalog,
            resolver,
            converter: None,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn EbookConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Convert the attempt's download to EPUB.
    pub async fn convert_to_canonical(&self, attempt_id: &str) -> StageOutcome {
        let (mut attempt, processing) = match self.prepare(attempt_id) {
            Ok(prepared) => prepared,
            Err(e) => return self.reject("convert", attempt_id, e),
        };

        let result = self.convert(&processing, &mut attempt).await;
        self.finish("convert", attempt, result, |attempt, (path, message)| {
            attempt.post_processed_file_path = Some(path.to_string_lossy().to_string());
            StageOutcome::succeeded(message, path.to_string_lossy())
        })
    }

    /// Copy the attempt's file into the library tree with its sidecars.
    pub async fn organize_to_library(&self, attempt_id: &str) -> StageOutcome {
        let (mut attempt, processing) = match self.prepare(attempt_id) {
            Ok(prepared) => prepared,
            Err(e) => return self.reject("organize", attempt_id, e),
        };

        let media = match self.catalog.get(&attempt.media) {
            Ok(media) => media,
            Err(CatalogError::NotFound(m)) => {
                return self.reject("organize", attempt_id, PostProcessError::MediaNotFound(m))
            }
            Err(e) => return self.reject("organize", attempt_id, e.into()),
        };

        let result = self.organize(&processing, &mut attempt, &media).await;

        let outcome_status = match &result {
            Ok(organized) => {
                let library_path = organized.library_path.to_string_lossy().to_string();
                let cover_path = organized
                    .cover_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string());
                self.catalog
                    .update_library_paths(&attempt.media, &library_path, cover_path.as_deref())
                    .and_then(|_| {
                        self.catalog
                            .update_status(&attempt.media, MediaStatus::PostProcessedSuccess)
                    })
            }
            Err(_) => self
                .catalog
                .update_status(&attempt.media, MediaStatus::PostProcessedFailed),
        };
        if let Err(e) = outcome_status {
            warn!(media = %attempt.media, error = %e, "Failed to update media after organization");
        }

        self.finish("organize", attempt, result, |attempt, organized| {
            let path = organized.library_path.to_string_lossy().to_string();
            attempt.post_processed_file_path = Some(path.clone());
            StageOutcome::succeeded(format!("Successfully organized to library: {}", path), path)
        })
    }

    /// Load the attempt and processing config, and mark the stage as started.
    fn prepare(
        &self,
        attempt_id: &str,
    ) -> Result<(DownloadAttempt, ProcessingConfig), PostProcessError> {
        let mut attempt = self
            .attempts
            .get(attempt_id)?
            .ok_or_else(|| PostProcessError::AttemptNotFound(attempt_id.to_string()))?;
        let processing = self
            .resolver
            .processing()
            .ok_or(PostProcessError::ConfigurationMissing)?;

        attempt.post_process_status = Some(PostProcessStatus::Processing);
        attempt.post_process_error_type = None;
        attempt.post_process_error_reason = None;
        let attempt = self.attempts.save(&attempt)?;
        Ok((attempt, processing))
    }

    /// Outcome for a stage that could not start; nothing is recorded.
    fn reject(&self, stage: &str, attempt_id: &str, error: PostProcessError) -> StageOutcome {
        warn!(attempt_id = %attempt_id, stage, error = %error, "Post-processing stage rejected");
        metrics::POST_PROCESS_STAGES
            .with_label_values(&[stage, "failed"])
            .inc();
        StageOutcome::failed(&error)
    }

    /// Record the stage result on the attempt and build the outcome.
    fn finish<T>(
        &self,
        stage: &str,
        mut attempt: DownloadAttempt,
        result: Result<T, PostProcessError>,
        on_success: impl FnOnce(&mut DownloadAttempt, T) -> StageOutcome,
    ) -> StageOutcome {
        let outcome = match result {
            Ok(value) => {
                let outcome = on_success(&mut attempt, value);
                attempt.post_process_status = Some(PostProcessStatus::Completed);
                info!(attempt_id = %attempt.id, stage, message = ?outcome.message, "Post-processing stage finished");
                outcome
            }
            Err(e) => {
                warn!(attempt_id = %attempt.id, stage, error = %e, "Post-processing stage failed");
                attempt.post_process_status = Some(PostProcessStatus::Failed);
                attempt.post_process_error_type = Some(e.error_type().to_string());
                attempt.post_process_error_reason = Some(e.to_string());
                StageOutcome::failed(&e)
            }
        };

        if let Err(e) = self.attempts.save(&attempt) {
            warn!(attempt_id = %attempt.id, error = %e, "Failed to record post-processing result");
            return StageOutcome::failed(&PostProcessError::Store(e));
        }

        let label = if outcome.success { "success" } else { "failed" };
        metrics::POST_PROCESS_STAGES
            .with_label_values(&[stage, label])
            .inc();
        outcome
    }

    fn converter(&self, processing: &ProcessingConfig) -> Arc<dyn EbookConverter> {
        match &self.converter {
            Some(converter) => converter.clone(),
            None => Arc::new(EbookConvertConverter::from_config(processing)),
        }
    }

    /// The downloaded file: the recorded raw path if it still exists, else discovery.
    fn locate_download(
        &self,
        processing: &ProcessingConfig,
        attempt: &mut DownloadAttempt,
    ) -> Result<PathBuf, PostProcessError> {
        if let Some(raw) = attempt.raw_file_path.as_deref().map(PathBuf::from) {
            if raw.exists() {
                return Ok(raw);
            }
        }

        let found = discover(
            &processing.downloads_root,
            &attempt.release_title,
            attempt.download_client_job_id.as_deref(),
        )?;
        info!(attempt_id = %attempt.id, path = %found.display(), "Discovered downloaded file");
        attempt.raw_file_path = Some(found.to_string_lossy().to_string());
        Ok(found)
    }

    async fn convert(
        &self,
        processing: &ProcessingConfig,
        attempt: &mut DownloadAttempt,
    ) -> Result<(PathBuf, String), PostProcessError> {
        let input = self.locate_download(processing, attempt)?;

        if input.is_dir() {
            return Ok((input, "Audiobook files need no conversion".to_string()));
        }
        if is_canonical(&input) {
            return Ok((input, "File is already EPUB format".to_string()));
        }

        let job = ConversionJob {
            job_id: attempt.id.clone(),
            output_path: canonical_output_path(&input),
            input_path: input,
        };
        let result = self.converter(processing).convert(&job).await?;
        let message = format!("Converted to EPUB: {}", result.output_path.display());
        Ok((result.output_path, message))
    }

    /// Source for organization: post-processed file, then raw file, then discovery.
    fn organize_source(
        &self,
        processing: &ProcessingConfig,
        attempt: &mut DownloadAttempt,
    ) -> Result<PathBuf, PostProcessError> {
        if let Some(done) = attempt.post_processed_file_path.as_deref().map(PathBuf::from) {
            if done.exists() {
                return Ok(done);
            }
        }
        self.locate_download(processing, attempt)
    }

    async fn organize(
        &self,
        processing: &ProcessingConfig,
        attempt: &mut DownloadAttempt,
        media: &MediaItem,
    ) -> Result<Organized, PostProcessError> {
        let source = self.organize_source(processing, attempt)?;
        let author = media
            .authors
            .iter()
            .map(|a| a.trim())
            .find(|a| !a.is_empty());
        let organizer = FsOrganizer::new(processing.verify_checksum);

        let (library_path, sidecar_dir) = if source.is_dir() {
            let dir = library_dir(&processing.library_root, author, &media.title);
            organizer.organize_directory(&source, &dir).await?;
            (dir.clone(), dir)
        } else {
            let extension = source
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            let destination =
                library_file(&processing.library_root, author, &media.title, &extension);
            organizer.organize_file(&source, &destination).await?;
            let dir = destination
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| processing.library_root.clone());
            (destination, dir)
        };

        let stem = library_dir(&processing.library_root, author, &media.title)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown Title".to_string());

        let cover_path = self
            .save_cover(processing, media, &sidecar_dir.join(format!("{}.jpg", stem)))
            .await;
        let cover_file = cover_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string());

        let opf_path = sidecar_dir.join(format!("{}.opf", stem));
        if let Err(e) = write_opf(&opf_path, media, cover_file.as_deref()).await {
            warn!(path = %opf_path.display(), error = %e, "Failed to write metadata sidecar");
            metrics::SOFT_FAILURES.with_label_values(&["metadata"]).inc();
        }

        Ok(Organized {
            library_path,
            cover_path,
        })
    }

    /// Best-effort cover download. An existing cover is reused.
    async fn save_cover(
        &self,
        processing: &ProcessingConfig,
        media: &MediaItem,
        destination: &Path,
    ) -> Option<PathBuf> {
        if destination.exists() {
            return Some(destination.to_path_buf());
        }
        let url = media.cover_url.as_deref().filter(|u| !u.trim().is_empty())?;

        let fetched = match CoverFetcher::new(processing.cover_timeout_secs) {
            Ok(fetcher) => fetcher.fetch(url, destination).await,
            Err(e) => Err(e),
        };
        match fetched {
            Ok(_) => Some(destination.to_path_buf()),
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to download cover");
                metrics::SOFT_FAILURES.with_label_values(&["cover"]).inc();
                None
            }
        }
    }
}
