//! Priority-ordered set of live metadata providers.

use std::sync::Arc;

use tracing::warn;

use crate::catalog::MediaKind;
use crate::config::{ConfigResolver, MetadataProviderKind};

use super::{BookMetadata, MetadataError, MetadataProvider, OpenLibraryClient};

/// Enabled metadata providers in priority order.
#[derive(Clone, Default)]
pub struct MetadataProviders {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl MetadataProviders {
    /// Wrap already-built providers. Order is kept as given.
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self { providers }
    }

    /// Build clients for every enabled provider the resolver returns.
    pub fn from_resolver(resolver: &dyn ConfigResolver) -> Result<Self, MetadataError> {
        let mut providers: Vec<Arc<dyn MetadataProvider>> = Vec::new();
        for config in resolver.metadata_providers() {
            match config.kind {
                MetadataProviderKind::Openlibrary => {
                    providers.push(Arc::new(OpenLibraryClient::new(config)?));
                }
            }
        }
        Ok(Self { providers })
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn all(&self) -> &[Arc<dyn MetadataProvider>] {
        &self.providers
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MetadataProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Providers that support `kind`, highest priority first.
    pub fn for_kind(&self, kind: MediaKind) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.supports(kind))
            .cloned()
            .collect()
    }

    /// First provider for `kind` returning a non-empty result.
    ///
    /// A failing provider is logged and skipped; its error is returned only
    /// when no provider produced results.
    pub async fn search(
        &self,
        query: &str,
        kind: MediaKind,
        language: Option<&str>,
    ) -> Result<Vec<BookMetadata>, MetadataError> {
        let mut last_error = None;
        for provider in self.for_kind(kind) {
            match provider.search(query, kind, language).await {
                Ok(results) if !results.is_empty() => return Ok(results),
                Ok(_) => {}
                Err(e) => {
                    warn!(provider = %provider.name(), error = %e, "Metadata search failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}
