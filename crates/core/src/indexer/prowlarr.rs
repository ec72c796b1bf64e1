//! Prowlarr indexer aggregator client.

use async_trait::async_trait;
use reqwest::{redirect, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::IndexerConfig;

use super::{IndexerClient, IndexerError, Protocol, SearchResult, SubmittedJob};

/// Prowlarr release as returned by `/api/v1/search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProwlarrRelease {
    guid: String,
    title: String,
    #[serde(default)]
    indexer: String,
    indexer_id: i64,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    publish_date: Option<String>,
    #[serde(default)]
    seeders: Option<i64>,
    #[serde(default)]
    peers: Option<i64>,
    #[serde(default)]
    protocol: Option<Protocol>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    info_url: Option<String>,
}

impl From<ProwlarrRelease> for SearchResult {
    fn from(r: ProwlarrRelease) -> Self {
        SearchResult {
            guid: r.guid,
            title: r.title,
            indexer: r.indexer,
            indexer_id: r.indexer_id,
            size: r.size.unwrap_or(0).max(0) as u64,
            publish_date: r.publish_date,
            seeders: r.seeders.map(|s| s.max(0) as u32),
            peers: r.peers.map(|p| p.max(0) as u32),
            protocol: r.protocol.unwrap_or_default(),
            download_url: r.download_url.unwrap_or_default(),
            info_url: r.info_url,
        }
    }
}

/// Prowlarr API client.
pub struct ProwlarrClient {
    client: Client,
    /// Separate client that surfaces redirects instead of following them.
    resolver: Client,
    config: IndexerConfig,
    base_url: String,
}

impl ProwlarrClient {
    /// Create a new client for the given indexer configuration.
    pub fn new(config: IndexerConfig) -> Result<Self, IndexerError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexerError::ConnectionFailed(e.to_string()))?;
        let resolver = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| IndexerError::ConnectionFailed(e.to_string()))?;

        let base_url = build_base_url(&config);
        Ok(Self {
            client,
            resolver,
            config,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> IndexerError {
        if e.is_timeout() {
            IndexerError::Timeout(self.config.timeout_secs)
        } else if e.is_connect() {
            IndexerError::ConnectionFailed(e.to_string())
        } else {
            IndexerError::Protocol(e.to_string())
        }
    }

    async fn check_status(response: Response) -> Result<Response, IndexerError> {
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = body.chars().take(200).collect::<String>();
        Err(match status {
            StatusCode::UNAUTHORIZED => IndexerError::Auth,
            StatusCode::NOT_FOUND => IndexerError::NotFound(message),
            s if s.is_server_error() => IndexerError::Server {
                status: s.as_u16(),
                message,
            },
            s => IndexerError::Protocol(format!("HTTP {}: {}", s, message)),
        })
    }
}

/// `http(s)://host:port[/base_path]`
fn build_base_url(config: &IndexerConfig) -> String {
    let scheme = if config.use_ssl { "https" } else { "http" };
    let mut url = format!("{}://{}:{}", scheme, config.host, config.port);
    if let Some(base_path) = config.base_path.as_deref() {
        let trimmed = base_path.trim_matches('/');
        if !trimmed.is_empty() {
            url.push('/');
            url.push_str(trimmed);
        }
    }
    url
}

#[async_trait]
impl IndexerClient for ProwlarrClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn search(
        &self,
        query: &str,
        category: Option<u32>,
        limit: u32,
    ) -> Result<Vec<SearchResult>, IndexerError> {
        let mut url = format!(
            "{}/api/v1/search?q={}&limit={}&offset=0&sortdir=desc",
            self.base_url,
            urlencoding::encode(query),
            limit
        );
        if let Some(cat) = category {
            url.push_str(&format!("&cat={}", cat));
        }

        debug!(indexer = %self.config.name, query, "Searching Prowlarr");

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let items: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| IndexerError::Protocol(format!("Failed to parse response: {}", e)))?;

        // Skip malformed entries rather than failing the whole query
        let results: Vec<SearchResult> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<ProwlarrRelease>(item).ok())
            .map(SearchResult::from)
            .collect();

        debug!(
            indexer = %self.config.name,
            query,
            results = results.len(),
            "Prowlarr search complete"
        );

        Ok(results)
    }

    async fn resolve_download_url(
        &self,
        indexer_id: i64,
        guid: &str,
    ) -> Result<String, IndexerError> {
        let url = format!(
            "{}/{}/download?link={}",
            self.base_url,
            indexer_id,
            urlencoding::encode(guid)
        );

        let response = self
            .resolver
            .get(&url)
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        if response.status().is_redirection() {
            if let Some(location) = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                return Ok(location.to_string());
            }
        }

        Err(IndexerError::Protocol(format!(
            "indexer {} did not redirect to a download link (HTTP {})",
            indexer_id,
            response.status()
        )))
    }

    async fn submit_to_remote_client(
        &self,
        indexer_id: i64,
        guid: &str,
    ) -> Result<SubmittedJob, IndexerError> {
        let url = format!("{}/api/v1/search", self.base_url);
        let body = serde_json::json!({
            "guid": guid,
            "indexerId": indexer_id,
        });

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let grabbed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| IndexerError::Protocol(format!("Failed to parse response: {}", e)))?;

        let job_id = grabbed
            .get("guid")
            .and_then(|v| v.as_str())
            .unwrap_or(guid)
            .to_string();

        Ok(SubmittedJob { job_id })
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/api/v1/system/status", self.base_url);
        match self
            .client
            .get(&url)
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(indexer = %self.config.name, error = %e, "Prowlarr connection test failed");
                false
            }
        }
    }
}
