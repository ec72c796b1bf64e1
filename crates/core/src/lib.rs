pub mod attempt;
pub mod catalog;
pub mod config;
pub mod converter;
pub mod download_client;
pub mod error;
pub mod indexer;
pub mod metadata;
pub mod metrics;
pub mod orchestrator;
pub mod organizer;
pub mod processor;
pub mod reconciler;
pub mod search;
pub mod service;
pub mod testing;

pub use attempt::{
    AttemptError, AttemptStatus, AttemptStore, BlacklistEntry, BlacklistReason, DownloadAttempt,
    PostProcessStatus, SqliteAttemptStore,
};
pub use catalog::{
    CatalogError, CreateMediaRequest, MediaCatalog, MediaItem, MediaKind, MediaRef, MediaStatus,
    SqliteMediaCatalog,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ConfigResolver,
    SanitizedConfig, StaticConfigResolver, SubmissionMode,
};
pub use download_client::{DownloadClient, DownloadClientFactory, HttpDownloadClientFactory};
pub use error::{CoreError, ErrorKind};
pub use indexer::{IndexerClient, ProwlarrClient, Protocol, SearchResult};
pub use metadata::{BookMetadata, MetadataProvider, MetadataProviders, OpenLibraryClient};
pub use orchestrator::{BlacklistOutcome, DeleteOutcome};
pub use processor::StageOutcome;
pub use reconciler::AttemptProgress;
pub use service::{
    AcquisitionService, AddedMedia, ConnectionReport, ExternalRef, ExternalStatus, KindStatus,
    ServiceCheck,
};
