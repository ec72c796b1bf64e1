//! SABnzbd download client.
//!
//! Every call goes through `GET /api?mode=...&apikey=...&output=json`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{DownloadClientConfig, DownloadClientKind};
use crate::indexer::Protocol;

use super::{DownloadClient, DownloadClientError, DownloadClientFactory, JobStatus};

/// SABnzbd API client.
pub struct SabnzbdClient {
    client: Client,
    config: DownloadClientConfig,
    base_url: String,
}

impl SabnzbdClient {
    pub fn new(config: DownloadClientConfig) -> Result<Self, DownloadClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;

        let scheme = if config.use_ssl { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", scheme, config.host, config.port);

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, mode: &str, params: &[(&str, &str)]) -> Result<Value, DownloadClientError> {
        let mut url = format!(
            "{}/api?mode={}&apikey={}&output=json",
            self.base_url,
            urlencoding::encode(mode),
            urlencoding::encode(&self.config.api_key)
        );
        for (key, value) in params {
            url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadClientError::Timeout
            } else if e.is_connect() {
                DownloadClientError::ConnectionFailed(e.to_string())
            } else {
                DownloadClientError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DownloadClientError::AuthenticationFailed);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DownloadClientError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| DownloadClientError::ApiError(format!("Failed to parse response: {}", e)))?;

        if data.get("status").and_then(Value::as_bool) == Some(false) {
            let error = data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(DownloadClientError::ApiError(format!(
                "SABnzbd API error: {}",
                error
            )));
        }

        Ok(data)
    }

    async fn queue_slots(&self) -> Result<Vec<Value>, DownloadClientError> {
        let data = self.request("queue", &[]).await?;
        Ok(slots(&data, "queue"))
    }

    async fn history_slots(&self) -> Result<Vec<Value>, DownloadClientError> {
        let data = self.request("history", &[]).await?;
        Ok(slots(&data, "history"))
    }
}

fn slots(data: &Value, section: &str) -> Vec<Value> {
    data.get(section)
        .and_then(|s| s.get("slots"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn str_field(slot: &Value, key: &str) -> String {
    slot.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// SABnzbd reports most numbers as strings.
fn num_field(slot: &Value, key: &str) -> f64 {
    match slot.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn from_queue_slot(slot: &Value) -> JobStatus {
    let time_left = str_field(slot, "timeleft");
    JobStatus {
        job_id: str_field(slot, "nzo_id"),
        name: str_field(slot, "filename"),
        status: str_field(slot, "status"),
        progress: num_field(slot, "percentage"),
        mb_left: num_field(slot, "mbleft"),
        mb_total: num_field(slot, "mb"),
        time_left: (!time_left.is_empty()).then_some(time_left),
        path: None,
    }
}

fn from_history_slot(slot: &Value) -> JobStatus {
    let status = str_field(slot, "status");
    let path = str_field(slot, "storage");
    let path = if path.is_empty() {
        str_field(slot, "path")
    } else {
        path
    };
    JobStatus {
        job_id: str_field(slot, "nzo_id"),
        name: str_field(slot, "name"),
        progress: if status == "Completed" { 100.0 } else { 0.0 },
        status,
        mb_left: 0.0,
        mb_total: num_field(slot, "bytes") / (1024.0 * 1024.0),
        time_left: None,
        path: (!path.is_empty()).then_some(path),
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn supports(&self, protocol: Protocol) -> bool {
        protocol == Protocol::Usenet
    }

    async fn submit(
        &self,
        url: &str,
        category: &str,
        name: &str,
    ) -> Result<Option<String>, DownloadClientError> {
        let data = self
            .request(
                "addurl",
                &[("name", url), ("cat", category), ("nzbname", name)],
            )
            .await?;

        let job_id = data
            .get("nzo_ids")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(client = %self.config.name, job_id = ?job_id, name, "Submitted download to SABnzbd");
        Ok(job_id)
    }

    async fn job_status(&self, job_id: &str) -> Result<Option<JobStatus>, DownloadClientError> {
        if let Some(slot) = self
            .queue_slots()
            .await?
            .iter()
            .find(|s| s.get("nzo_id").and_then(Value::as_str) == Some(job_id))
        {
            return Ok(Some(from_queue_slot(slot)));
        }

        let found = self
            .history_slots()
            .await?
            .iter()
            .find(|s| s.get("nzo_id").and_then(Value::as_str) == Some(job_id))
            .map(from_history_slot);

        debug!(client = %self.config.name, job_id, found = found.is_some(), "SABnzbd job lookup");
        Ok(found)
    }

    async fn delete_job(&self, job_id: &str) -> Result<bool, DownloadClientError> {
        let data = self
            .request("queue", &[("name", "delete"), ("value", job_id)])
            .await?;
        Ok(data.get("status").and_then(Value::as_bool) == Some(true))
    }

    async fn test_connection(&self) -> bool {
        self.request("version", &[])
            .await
            .map(|data| data.get("version").is_some())
            .unwrap_or(false)
    }
}

/// Builds HTTP clients for configured download clients.
#[derive(Debug, Default, Clone)]
pub struct HttpDownloadClientFactory;

impl DownloadClientFactory for HttpDownloadClientFactory {
    fn create(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<Arc<dyn DownloadClient>, DownloadClientError> {
        match config.kind {
            DownloadClientKind::Sabnzbd => Ok(Arc::new(SabnzbdClient::new(config.clone())?)),
        }
    }
}
