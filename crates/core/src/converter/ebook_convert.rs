//! Calibre `ebook-convert` based converter.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::config::ProcessingConfig;
use crate::metrics;

use super::error::ConverterError;
use super::traits::EbookConverter;
use super::types::{ConversionJob, ConversionResult};

/// Runs `<binary> <input> <output>` with a bounded timeout.
pub struct EbookConvertConverter {
    binary: PathBuf,
    timeout_secs: u64,
}

impl EbookConvertConverter {
    pub fn new(binary: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.converter_path.clone(), config.converter_timeout_secs)
    }

    fn spawn_error(&self, e: std::io::Error) -> ConverterError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConverterError::NotFound {
                path: self.binary.clone(),
            }
        } else {
            ConverterError::Io(e)
        }
    }

    async fn run(&self, job: &ConversionJob) -> Result<ConversionResult, ConverterError> {
        let start = Instant::now();

        if !job.input_path.exists() {
            return Err(ConverterError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                ConverterError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        debug!(
            binary = %self.binary.display(),
            input = %job.input_path.display(),
            output = %job.output_path.display(),
            "Running converter"
        );

        let child = Command::new(&self.binary)
            .arg(&job.input_path)
            .arg(&job.output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let output = match timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(job_id = %job.job_id, timeout_secs = self.timeout_secs, "Conversion timed out");
                return Err(ConverterError::Timeout {
                    timeout_secs: self.timeout_secs,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let captured = if stderr.is_empty() { stdout } else { stderr };
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(ConverterError::conversion_failed(
                format!("exit code {}: {}", code, captured),
                (!captured.is_empty()).then_some(captured),
            ));
        }

        let metadata = match tokio::fs::metadata(&job.output_path).await {
            Ok(m) => m,
            Err(_) => {
                return Err(ConverterError::OutputMissing {
                    path: job.output_path.clone(),
                })
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            job_id = %job.job_id,
            output = %job.output_path.display(),
            duration_ms,
            "Conversion finished"
        );

        Ok(ConversionResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: metadata.len(),
            duration_ms,
        })
    }
}

#[async_trait]
impl EbookConverter for EbookConvertConverter {
    fn name(&self) -> &str {
        "ebook-convert"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<ConversionResult, ConverterError> {
        let start = Instant::now();
        let result = self.run(job).await;

        let label = if result.is_ok() { "success" } else { "failed" };
        metrics::CONVERSION_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(())
    }
}
