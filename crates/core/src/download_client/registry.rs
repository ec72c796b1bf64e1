//! Lookup of live download clients from configuration.

use std::sync::Arc;

use crate::config::{ConfigResolver, DownloadClientConfig};

use super::{DownloadClient, DownloadClientError, DownloadClientFactory};

/// Resolves configured download clients into live clients.
#[derive(Clone)]
pub struct DownloadClients {
    resolver: Arc<dyn ConfigResolver>,
    factory: Arc<dyn DownloadClientFactory>,
}

impl DownloadClients {
    pub fn new(resolver: Arc<dyn ConfigResolver>, factory: Arc<dyn DownloadClientFactory>) -> Self {
        Self { resolver, factory }
    }

    /// The first enabled client by priority, with its configuration.
    pub fn preferred(
        &self,
    ) -> Result<Option<(DownloadClientConfig, Arc<dyn DownloadClient>)>, DownloadClientError> {
        match self.resolver.download_client() {
            Some(config) => {
                let client = self.factory.create(&config)?;
                Ok(Some((config, client)))
            }
            None => Ok(None),
        }
    }

    /// The client an attempt was submitted to, if it is still configured.
    pub fn named(&self, name: &str) -> Result<Option<Arc<dyn DownloadClient>>, DownloadClientError> {
        self.resolver
            .download_client_named(name)
            .map(|config| self.factory.create(&config))
            .transpose()
    }
}
