//! Mock download client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::DownloadClientConfig;
use crate::download_client::{
    DownloadClient, DownloadClientError, DownloadClientFactory, JobStatus,
};
use crate::indexer::Protocol;

/// A recorded submit call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub url: String,
    pub category: String,
    pub name: String,
    pub job_id: String,
}

/// Mock implementation of the DownloadClient trait.
///
/// Submitted jobs appear in the queue as "Queued". Tests drive them with
/// [`MockDownloadClient::set_job_status`] or drop them with [`MockDownloadClient::remove_job`].
#[derive(Debug)]
pub struct MockDownloadClient {
    submissions: Arc<RwLock<Vec<RecordedSubmission>>>,
    jobs: Arc<RwLock<HashMap<String, JobStatus>>>,
    deleted: Arc<RwLock<Vec<String>>>,
    status_calls: Arc<RwLock<u32>>,
    job_counter: Arc<RwLock<u32>>,
    next_submit_error: Arc<RwLock<Option<DownloadClientError>>>,
    /// Persistent until cleared, so repeated polls keep failing.
    status_error: Arc<RwLock<Option<DownloadClientError>>>,
    delete_outcome: Arc<RwLock<Result<bool, DownloadClientError>>>,
    reachable: Arc<RwLock<bool>>,
}

impl Default for MockDownloadClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDownloadClient {
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(Vec::new())),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            status_calls: Arc::new(RwLock::new(0)),
            job_counter: Arc::new(RwLock::new(0)),
            next_submit_error: Arc::new(RwLock::new(None)),
            status_error: Arc::new(RwLock::new(None)),
            delete_outcome: Arc::new(RwLock::new(Ok(true))),
            reachable: Arc::new(RwLock::new(true)),
        }
    }

    pub async fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    pub async fn deleted_jobs(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    pub async fn status_call_count(&self) -> u32 {
        *self.status_calls.read().await
    }

    pub async fn set_next_submit_error(&self, error: DownloadClientError) {
        *self.next_submit_error.write().await = Some(error);
    }

    pub async fn set_status_error(&self, error: Option<DownloadClientError>) {
        *self.status_error.write().await = error;
    }

    pub async fn set_delete_outcome(&self, outcome: Result<bool, DownloadClientError>) {
        *self.delete_outcome.write().await = outcome;
    }

    /// What `test_connection` reports. Reachable by default.
    pub async fn set_reachable(&self, reachable: bool) {
        *self.reachable.write().await = reachable;
    }

    /// Insert or replace a job with the given raw status string.
    pub async fn set_job_status(&self, job_id: &str, status: &str, path: Option<&str>) {
        let progress = match status {
            "Completed" => 100.0,
            "Downloading" => 50.0,
            _ => 0.0,
        };
        self.jobs.write().await.insert(
            job_id.to_string(),
            JobStatus {
                job_id: job_id.to_string(),
                name: job_id.to_string(),
                status: status.to_string(),
                progress,
                mb_left: 0.0,
                mb_total: 10.0,
                time_left: None,
                path: path.map(str::to_string),
            },
        );
    }

    /// Make a job vanish from queue and history.
    pub async fn remove_job(&self, job_id: &str) {
        self.jobs.write().await.remove(job_id);
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        "mock-sabnzbd"
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
        if let Some(error) = self.next_submit_error.write().await.take() {
            return Err(error);
        }

        let job_id = {
            let mut counter = self.job_counter.write().await;
            *counter += 1;
            format!("SABnzbd_nzo_{}", *counter)
        };

        self.submissions.write().await.push(RecordedSubmission {
            url: url.to_string(),
            category: category.to_string(),
            name: name.to_string(),
            job_id: job_id.clone(),
        });
        self.set_job_status(&job_id, "Queued", None).await;

        Ok(Some(job_id))
    }

    async fn job_status(&self, job_id: &str) -> Result<Option<JobStatus>, DownloadClientError> {
        *self.status_calls.write().await += 1;

        if let Some(error) = self.status_error.read().await.clone() {
            return Err(error);
        }

        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn delete_job(&self, job_id: &str) -> Result<bool, DownloadClientError> {
        let outcome = self.delete_outcome.read().await.clone();
        if matches!(outcome, Ok(true)) {
            self.jobs.write().await.remove(job_id);
            self.deleted.write().await.push(job_id.to_string());
        }
        outcome
    }

    async fn test_connection(&self) -> bool {
        *self.reachable.read().await
    }
}

/// Factory that hands out one shared [`MockDownloadClient`] for every config.
#[derive(Debug, Clone)]
pub struct MockDownloadClientFactory {
    client: Arc<MockDownloadClient>,
}

impl MockDownloadClientFactory {
    pub fn new(client: Arc<MockDownloadClient>) -> Self {
        Self { client }
    }
}

impl DownloadClientFactory for MockDownloadClientFactory {
    fn create(
        &self,
        _config: &DownloadClientConfig,
    ) -> Result<Arc<dyn DownloadClient>, DownloadClientError> {
        Ok(self.client.clone())
    }
}
