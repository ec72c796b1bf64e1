use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::attempt::{AttemptStore, BlacklistReason, DownloadAttempt};
use crate::catalog::{CatalogError, MediaCatalog, MediaItem, MediaKind, MediaStatus};
use crate::config::ConfigResolver;
use crate::converter::EbookConverter;
use crate::download_client::{DownloadClientFactory, DownloadClients};
use crate::error::CoreError;
use crate::indexer::{IndexerClient, SearchResult};
use crate::metadata::{BookMetadata, IdentifierType, MetadataError, MetadataProviders};
use crate::orchestrator::{BlacklistOutcome, DeleteOutcome, DownloadOrchestrator};
use crate::processor::{PostProcessor, StageOutcome};
use crate::reconciler::{AttemptProgress, StatusReconciler};
use crate::search::SearchAggregator;

/// Reachability of one external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCheck {
    pub name: String,
    pub reachable: bool,
}

/// Reachability of the indexer, the preferred download client and every
/// metadata provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub indexer: ServiceCheck,
    /// `None` when no download client is enabled.
    pub download_client: Option<ServiceCheck>,
    pub metadata_providers: Vec<ServiceCheck>,
}

impl ConnectionReport {
    pub fn all_reachable(&self) -> bool {
        self.indexer.reachable
            && self
                .download_client
                .as_ref()
                .map_or(true, |check| check.reachable)
            && self.metadata_providers.iter().all(|check| check.reachable)
    }
}

/// Outcome of adding a wanted item from a provider record.
#[derive(Debug, Clone, Serialize)]
pub struct AddedMedia {
    /// False when the record was already in the catalog.
    pub created: bool,
    pub media: MediaItem,
}

/// A provider record to look up in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub provider: String,
    pub external_id: String,
}

/// Whether a record is wanted as one kind of media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindStatus {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MediaStatus>,
}

impl From<Option<MediaItem>> for KindStatus {
    fn from(item: Option<MediaItem>) -> Self {
        match item {
            Some(item) => KindStatus {
                exists: true,
                media_id: Some(item.id),
                status: Some(item.status),
            },
            None => KindStatus::default(),
        }
    }
}

/// Catalog state of one provider record, as a book and as an audiobook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalStatus {
    pub provider: String,
    pub external_id: String,
    pub book: KindStatus,
    pub audiobook: KindStatus,
    /// Set when the provider is not configured; both kinds are then absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facade over search, download, reconciliation and post-processing.
pub struct AcquisitionService {
    catalog: Arc<dyn MediaCatalog>,
    resolver: Arc<dyn ConfigResolver>,
    indexer: Arc<dyn IndexerClient>,
    clients: DownloadClients,
    search: SearchAggregator,
    orchestrator: DownloadOrchestrator,
    reconciler: StatusReconciler,
    processor: PostProcessor,
    metadata: MetadataProviders,
}

impl AcquisitionService {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn MediaCatalog>,
        indexer: Arc<dyn IndexerClient>,
        resolver: Arc<dyn ConfigResolver>,
        factory: Arc<dyn DownloadClientFactory>,
    ) -> Self {
        Self {
            search: SearchAggregator::new(indexer.clone(), attempts.clone()),
            clients: DownloadClients::new(resolver.clone(), factory.clone()),
            orchestrator: DownloadOrchestrator::new(
                attempts.clone(),
                catalog.clone(),
                indexer.clone(),
                resolver.clone(),
                factory.clone(),
            ),
            reconciler: StatusReconciler::new(
                attempts.clone(),
                catalog.clone(),
                resolver.clone(),
                factory,
            ),
            processor: PostProcessor::new(attempts, catalog.clone(), resolver.clone()),
            catalog,
            resolver,
            indexer,
            metadata: MetadataProviders::default(),
        }
    }

    /// Metadata providers used for lookups and add-wanted validation.
    pub fn with_metadata_providers(mut self, providers: MetadataProviders) -> Self {
        self.metadata = providers;
        self
    }

    /// Use a fixed converter instead of the configured `ebook-convert`.
    pub fn with_converter(mut self, converter: Arc<dyn EbookConverter>) -> Self {
        self.processor = self.processor.with_converter(converter);
        self
    }

    pub fn catalog(&self) -> &Arc<dyn MediaCatalog> {
        &self.catalog
    }

    pub fn resolver(&self) -> &Arc<dyn ConfigResolver> {
        &self.resolver
    }

    fn media(&self, media_id: &str) -> Result<MediaItem, CoreError> {
        self.catalog
            .find(media_id)?
            .ok_or_else(|| CoreError::NotFound(format!("Media not found: {}", media_id)))
    }

    /// Ranked, deduplicated releases for a media item, minus its blacklist.
    pub async fn search_for_media(&self, media_id: &str) -> Result<Vec<SearchResult>, CoreError> {
        let media = self.media(media_id)?;
        let results = self.search.search(&media).await?;
        debug!(media = %media.media_ref(), results = results.len(), "Search finished");
        Ok(results)
    }

    pub async fn initiate_download(
        &self,
        media_id: &str,
        result: &SearchResult,
    ) -> Result<DownloadAttempt, CoreError> {
        let media = self.media(media_id)?;
        Ok(self.orchestrator.initiate(&media, result).await?)
    }

    /// Attempts for a media item, newest first.
    pub fn get_download_attempts(&self, media_id: &str) -> Result<Vec<DownloadAttempt>, CoreError> {
        let media = self.media(media_id)?;
        Ok(self.orchestrator.attempts_for_media(&media.media_ref())?)
    }

    /// Reconcile an attempt with its download client and report live progress.
    pub async fn get_download_status(&self, attempt_id: &str) -> Result<AttemptProgress, CoreError> {
        Ok(self.reconciler.status_with_progress(attempt_id).await?)
    }

    pub async fn blacklist_release(
        &self,
        attempt_id: &str,
        reason: BlacklistReason,
        details: &str,
    ) -> Result<BlacklistOutcome, CoreError> {
        Ok(self
            .orchestrator
            .blacklist(attempt_id, reason, details)
            .await?)
    }

    pub async fn delete_attempt(&self, attempt_id: &str) -> Result<DeleteOutcome, CoreError> {
        Ok(self.orchestrator.delete(attempt_id).await?)
    }

    pub async fn convert_to_canonical(&self, attempt_id: &str) -> StageOutcome {
        self.processor.convert_to_canonical(attempt_id).await
    }

    pub async fn organize_to_library(&self, attempt_id: &str) -> StageOutcome {
        self.processor.organize_to_library(attempt_id).await
    }

    /// Ask the indexer and the preferred download client whether they answer.
    pub async fn check_connections(&self) -> ConnectionReport {
        let indexer = ServiceCheck {
            name: self.indexer.name().to_string(),
            reachable: self.indexer.test_connection().await,
        };

        let download_client = match self.clients.preferred() {
            Ok(Some((config, client))) => Some(ServiceCheck {
                name: config.name,
                reachable: client.test_connection().await,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Could not build download client for connection check");
                self.resolver.download_client().map(|config| ServiceCheck {
                    name: config.name,
                    reachable: false,
                })
            }
        };

        let mut metadata_providers = Vec::new();
        for provider in self.metadata.all() {
            metadata_providers.push(ServiceCheck {
                name: provider.name().to_string(),
                reachable: provider.test_connection().await,
            });
        }

        ConnectionReport {
            indexer,
            download_client,
            metadata_providers,
        }
    }

    /// Search metadata providers for `kind`, or only the named one.
    pub async fn search_metadata(
        &self,
        query: &str,
        kind: MediaKind,
        language: Option<&str>,
        provider: Option<&str>,
    ) -> Result<Vec<BookMetadata>, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::Validation("Search query is required".to_string()));
        }
        if self.metadata.is_empty() {
            return Err(CoreError::ConfigurationMissing(
                "No metadata provider configured".to_string(),
            ));
        }

        let results = match provider {
            Some(name) => {
                let provider = self.metadata.get(name).ok_or_else(|| {
                    CoreError::Validation(format!("Unknown metadata provider: {}", name))
                })?;
                if !provider.supports(kind) {
                    return Err(CoreError::Validation(format!(
                        "Provider {} does not support {}",
                        name,
                        kind.as_str()
                    )));
                }
                provider.search(query, kind, language).await?
            }
            None => self.metadata.search(query, kind, language).await?,
        };
        debug!(query = %query, kind = kind.as_str(), results = results.len(), "Metadata search finished");
        Ok(results)
    }

    /// First provider record for an ISBN-10 or ISBN-13.
    pub async fn lookup_isbn(&self, isbn: &str) -> Result<BookMetadata, CoreError> {
        let identifier_type = IdentifierType::for_isbn(isbn)
            .ok_or_else(|| CoreError::Validation(format!("Not an ISBN: {}", isbn)))?;
        let isbn: String = isbn.chars().filter(|c| c.is_ascii_alphanumeric()).collect();

        let mut last_error: Option<MetadataError> = None;
        for provider in self.metadata.for_kind(MediaKind::Book) {
            match provider.fetch_by_identifier(&isbn, identifier_type).await {
                Ok(Some(found)) => return Ok(found),
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = %provider.name(), isbn = %isbn, error = %e, "ISBN lookup failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e.into()),
            None => Err(CoreError::NotFound(format!("No record for ISBN {}", isbn))),
        }
    }

    /// Add a provider record as wanted media of `kind`.
    ///
    /// Adding a record that is already wanted as the same kind returns the
    /// existing item with `created: false`.
    pub fn add_wanted_media(
        &self,
        kind: MediaKind,
        metadata: &BookMetadata,
    ) -> Result<AddedMedia, CoreError> {
        if metadata.provider_id.trim().is_empty() {
            return Err(CoreError::Validation("external_id is required".to_string()));
        }
        if metadata.title.trim().is_empty() {
            return Err(CoreError::Validation("title is required".to_string()));
        }
        if self.metadata.get(&metadata.provider).is_none() {
            return Err(CoreError::Validation(format!(
                "Unknown metadata provider: {}",
                metadata.provider
            )));
        }

        let existing = |catalog: &dyn MediaCatalog| {
            catalog.find_by_external_id(kind, &metadata.provider, &metadata.provider_id)
        };
        if let Some(media) = existing(self.catalog.as_ref())? {
            debug!(media = %media.media_ref(), "Media already wanted");
            return Ok(AddedMedia {
                created: false,
                media,
            });
        }

        match self.catalog.create(kind, &metadata.to_create_request()) {
            Ok(media) => {
                info!(media = %media.media_ref(), title = %media.title, "Media added as wanted");
                Ok(AddedMedia {
                    created: true,
                    media,
                })
            }
            // Lost a race with a concurrent add of the same record.
            Err(CatalogError::AlreadyExists(_)) => match existing(self.catalog.as_ref())? {
                Some(media) => Ok(AddedMedia {
                    created: false,
                    media,
                }),
                None => Err(CoreError::Storage(format!(
                    "Media {} vanished after conflict",
                    metadata.provider_id
                ))),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Catalog state of each record as a book and as an audiobook.
    pub fn media_status(&self, refs: &[ExternalRef]) -> Result<Vec<ExternalStatus>, CoreError> {
        let mut statuses = Vec::with_capacity(refs.len());
        for r in refs {
            if self.metadata.get(&r.provider).is_none() {
                statuses.push(ExternalStatus {
                    provider: r.provider.clone(),
                    external_id: r.external_id.clone(),
                    book: KindStatus::default(),
                    audiobook: KindStatus::default(),
                    error: Some(format!("Unknown metadata provider: {}", r.provider)),
                });
                continue;
            }
            let lookup = |kind| {
                self.catalog
                    .find_by_external_id(kind, &r.provider, &r.external_id)
            };
            statuses.push(ExternalStatus {
                provider: r.provider.clone(),
                external_id: r.external_id.clone(),
                book: lookup(MediaKind::Book)?.into(),
                audiobook: lookup(MediaKind::Audiobook)?.into(),
                error: None,
            });
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::SqliteAttemptStore;
    use crate::catalog::{MediaKind, SqliteMediaCatalog};
    use crate::config::StaticConfigResolver;
    use crate::error::ErrorKind;
    use crate::metadata::MetadataProvider;
    use crate::testing::{
        fixtures, MockDownloadClient, MockDownloadClientFactory, MockIndexer, MockMetadataProvider,
    };

    fn service(indexer: Arc<MockIndexer>) -> AcquisitionService {
        service_with(indexer, Arc::new(MockDownloadClient::new()), fixtures::config())
    }

    fn service_with(
        indexer: Arc<MockIndexer>,
        client: Arc<MockDownloadClient>,
        config: crate::config::Config,
    ) -> AcquisitionService {
        AcquisitionService::new(
            Arc::new(SqliteAttemptStore::in_memory().unwrap()),
            Arc::new(SqliteMediaCatalog::in_memory().unwrap()),
            indexer,
            Arc::new(StaticConfigResolver::new(config)),
            Arc::new(MockDownloadClientFactory::new(client)),
        )
    }

    #[tokio::test]
    async fn test_unknown_media_is_not_found() {
        let service = service(Arc::new(MockIndexer::new()));

        let err = service.search_for_media("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service.get_download_attempts("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_search_then_initiate() {
        let indexer = Arc::new(MockIndexer::new());
        indexer
            .set_results(
                "Dune Frank Herbert",
                vec![fixtures::release("g1", "NZBgeek", 4, "Dune")],
            )
            .await;
        let service = service(indexer);
        let media = service
            .catalog()
            .create(
                MediaKind::Book,
                &fixtures::media_request("Dune", &["Frank Herbert"]),
            )
            .unwrap();

        let results = service.search_for_media(&media.id).await.unwrap();
        assert_eq!(results.len(), 1);

        let attempt = service
            .initiate_download(&media.id, &results[0])
            .await
            .unwrap();
        let attempts = service.get_download_attempts(&media.id).unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].id, attempt.id);

        let err = service
            .initiate_download(&media.id, &results[0])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActiveDownloadExists);
    }

    #[tokio::test]
    async fn test_unknown_attempt_operations() {
        let service = service(Arc::new(MockIndexer::new()));

        assert_eq!(
            service.get_download_status("x").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            service.delete_attempt("x").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            service
                .blacklist_release("x", BlacklistReason::Manual, "")
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        let outcome = service.convert_to_canonical("x").await;
        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_check_connections_reports_each_service() {
        let indexer = Arc::new(MockIndexer::new());
        let client = Arc::new(MockDownloadClient::new());
        let service = service_with(indexer.clone(), client.clone(), fixtures::config());

        let report = service.check_connections().await;
        assert!(report.all_reachable());
        assert_eq!(report.indexer.name, "mock-indexer");
        assert_eq!(
            report.download_client,
            Some(ServiceCheck {
                name: "sab".to_string(),
                reachable: true
            })
        );

        client.set_reachable(false).await;
        let report = service.check_connections().await;
        assert!(report.indexer.reachable);
        assert!(!report.all_reachable());

        indexer.set_reachable(false).await;
        assert!(!service.check_connections().await.indexer.reachable);
    }

    #[tokio::test]
    async fn test_check_connections_without_download_client() {
        let mut config = fixtures::config();
        config.download_clients.clear();
        let service = service_with(
            Arc::new(MockIndexer::new()),
            Arc::new(MockDownloadClient::new()),
            config,
        );

        let report = service.check_connections().await;

        assert_eq!(report.download_client, None);
        assert!(report.all_reachable());
    }

    fn service_with_provider(provider: Arc<MockMetadataProvider>) -> AcquisitionService {
        service(Arc::new(MockIndexer::new())).with_metadata_providers(MetadataProviders::new(
            vec![provider as Arc<dyn MetadataProvider>],
        ))
    }

    #[tokio::test]
    async fn test_add_wanted_media_is_idempotent_per_kind() {
        let service = service_with_provider(Arc::new(MockMetadataProvider::new("openlibrary")));
        let record = fixtures::book_metadata("openlibrary", "OL893415W", "Dune");

        let first = service.add_wanted_media(MediaKind::Book, &record).unwrap();
        assert!(first.created);
        assert_eq!(first.media.status, MediaStatus::Wanted);
        assert_eq!(first.media.external_id.as_deref(), Some("OL893415W"));

        let again = service.add_wanted_media(MediaKind::Book, &record).unwrap();
        assert!(!again.created);
        assert_eq!(again.media.id, first.media.id);

        let audio = service.add_wanted_media(MediaKind::Audiobook, &record).unwrap();
        assert!(audio.created);
        assert_ne!(audio.media.id, first.media.id);
    }

    #[tokio::test]
    async fn test_add_wanted_media_validation() {
        let service = service_with_provider(Arc::new(MockMetadataProvider::new("openlibrary")));

        let unknown = fixtures::book_metadata("goodreads", "1", "Dune");
        let err = service.add_wanted_media(MediaKind::Book, &unknown).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let no_id = fixtures::book_metadata("openlibrary", " ", "Dune");
        let err = service.add_wanted_media(MediaKind::Book, &no_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_media_status_by_external_id() {
        let service = service_with_provider(Arc::new(MockMetadataProvider::new("openlibrary")));
        let record = fixtures::book_metadata("openlibrary", "OL893415W", "Dune");
        let added = service.add_wanted_media(MediaKind::Audiobook, &record).unwrap();

        let statuses = service
            .media_status(&[
                ExternalRef {
                    provider: "openlibrary".into(),
                    external_id: "OL893415W".into(),
                },
                ExternalRef {
                    provider: "goodreads".into(),
                    external_id: "OL893415W".into(),
                },
            ])
            .unwrap();

        assert_eq!(statuses[0].book, KindStatus::default());
        assert_eq!(
            statuses[0].audiobook,
            KindStatus {
                exists: true,
                media_id: Some(added.media.id),
                status: Some(MediaStatus::Wanted),
            }
        );
        assert!(statuses[0].error.is_none());
        assert!(statuses[1].error.is_some());
    }

    #[tokio::test]
    async fn test_search_metadata_by_provider() {
        let provider = Arc::new(
            MockMetadataProvider::new("openlibrary").with_kinds(&[MediaKind::Book]),
        );
        provider
            .add_record(fixtures::book_metadata("openlibrary", "OL893415W", "Dune"))
            .await;
        let service = service_with_provider(provider);

        let results = service
            .search_metadata("dune", MediaKind::Book, None, Some("openlibrary"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        let err = service
            .search_metadata("dune", MediaKind::Audiobook, None, Some("openlibrary"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .search_metadata("  ", MediaKind::Book, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_search_metadata_without_providers() {
        let service = service(Arc::new(MockIndexer::new()));
        let err = service
            .search_metadata("dune", MediaKind::Book, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationMissing);
    }

    #[tokio::test]
    async fn test_lookup_isbn() {
        let provider = Arc::new(MockMetadataProvider::new("openlibrary"));
        provider
            .add_record(fixtures::book_metadata("openlibrary", "OL893415W", "Dune"))
            .await;
        let service = service_with_provider(provider.clone());

        let found = service.lookup_isbn("978-0441172719").await.unwrap();
        assert_eq!(found.title, "Dune");

        assert_eq!(
            service.lookup_isbn("9780000000000").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            service.lookup_isbn("123").await.unwrap_err().kind(),
            ErrorKind::Validation
        );

        provider.set_error(MetadataError::Timeout(10)).await;
        assert_eq!(
            service.lookup_isbn("9780441172719").await.unwrap_err().kind(),
            ErrorKind::RemoteTimeout
        );
    }

    #[tokio::test]
    async fn test_check_connections_includes_metadata_providers() {
        let provider = Arc::new(MockMetadataProvider::new("openlibrary"));
        let service = service_with_provider(provider.clone());

        assert!(service.check_connections().await.all_reachable());

        provider.set_error(MetadataError::ConnectionFailed("refused".into())).await;
        let report = service.check_connections().await;
        assert_eq!(
            report.metadata_providers,
            vec![ServiceCheck {
                name: "openlibrary".into(),
                reachable: false
            }]
        );
        assert!(!report.all_reachable());
    }
}
