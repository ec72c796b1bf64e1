//! Mock converter for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::converter::{ConversionJob, ConversionResult, ConverterError, EbookConverter};

/// Mock implementation of the EbookConverter trait.
///
/// Successful conversions write a small placeholder file at the output path,
/// so later stages find a real file on disk.
///
/// # Example
///
/// ```rust,ignore
/// let converter = MockConverter::new();
/// converter.set_next_error(ConverterError::Timeout { timeout_secs: 300 }).await;
/// ```
#[derive(Debug, Default)]
pub struct MockConverter {
    conversions: Arc<RwLock<Vec<ConversionJob>>>,
    next_error: Arc<RwLock<Option<ConverterError>>>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next conversion fail.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    /// Jobs that were submitted, including failed ones.
    pub async fn recorded_conversions(&self) -> Vec<ConversionJob> {
        self.conversions.read().await.clone()
    }
}

#[async_trait]
impl EbookConverter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<ConversionResult, ConverterError> {
        self.conversions.write().await.push(job.clone());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&job.output_path, b"converted epub").await?;

        Ok(ConversionResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: 14,
            duration_ms: 1,
        })
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }
}
