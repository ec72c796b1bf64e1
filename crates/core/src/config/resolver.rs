//! Runtime selection of the active connection configs.
//!
//! Components receive a [`ConfigResolver`] instead of reading global settings,
//! so tests can hand them a fixed configuration.

use super::types::{
    Config, DownloadClientConfig, IndexerConfig, MetadataProviderConfig, ProcessingConfig,
    SubmissionMode,
};

/// Resolves which configuration entry is in effect.
pub trait ConfigResolver: Send + Sync {
    /// The enabled processing config, if any.
    fn processing(&self) -> Option<ProcessingConfig>;

    /// First enabled download client ordered by priority (ties broken by name).
    fn download_client(&self) -> Option<DownloadClientConfig>;

    /// A download client by name, regardless of enabled state.
    ///
    /// Used to reach the client an existing attempt was submitted to.
    fn download_client_named(&self, name: &str) -> Option<DownloadClientConfig>;

    /// First enabled indexer ordered by priority (ties broken by name).
    fn indexer(&self) -> Option<IndexerConfig>;

    /// How releases are handed to a download client.
    fn submission_mode(&self) -> SubmissionMode;

    /// Enabled metadata providers ordered by priority (ties broken by name).
    fn metadata_providers(&self) -> Vec<MetadataProviderConfig>;
}

/// Resolver over an in-memory [`Config`].
#[derive(Debug, Clone)]
pub struct StaticConfigResolver {
    config: Config,
}

impl StaticConfigResolver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl ConfigResolver for StaticConfigResolver {
    fn processing(&self) -> Option<ProcessingConfig> {
        self.config
            .processing
            .as_ref()
            .filter(|p| p.enabled)
            .cloned()
    }

    fn download_client(&self) -> Option<DownloadClientConfig> {
        self.config
            .download_clients
            .iter()
            .filter(|c| c.enabled)
            .min_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)))
            .cloned()
    }

    fn download_client_named(&self, name: &str) -> Option<DownloadClientConfig> {
        self.config
            .download_clients
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    fn indexer(&self) -> Option<IndexerConfig> {
        self.config
            .indexers
            .iter()
            .filter(|i| i.enabled)
            .min_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)))
            .cloned()
    }

    fn submission_mode(&self) -> SubmissionMode {
        self.config.download.submission
    }

    fn metadata_providers(&self) -> Vec<MetadataProviderConfig> {
        let mut providers: Vec<_> = self
            .config
            .metadata_providers
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .collect();
        providers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        providers
    }
}
