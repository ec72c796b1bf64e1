//! Acquisition lifecycle integration tests.
//!
//! These tests drive the service the way the HTTP layer does:
//! search -> initiate -> refresh -> convert -> organize, plus blacklist and delete.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use tomehound_core::{
    config::{Config, DownloadConfig, SubmissionMode},
    indexer::IndexerError,
    testing::{fixtures, MockConverter, MockDownloadClient, MockDownloadClientFactory, MockIndexer},
    AcquisitionService, AttemptStatus, BlacklistReason, ErrorKind, MediaCatalog,
    MediaItem, MediaKind, MediaStatus, PostProcessStatus, Protocol, SqliteAttemptStore,
    SqliteMediaCatalog, StaticConfigResolver,
};

/// All collaborators for one service under test.
struct TestHarness {
    service: AcquisitionService,
    indexer: Arc<MockIndexer>,
    client: Arc<MockDownloadClient>,
    converter: Arc<MockConverter>,
    catalog: Arc<SqliteMediaCatalog>,
    downloads: PathBuf,
    library: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_mode(SubmissionMode::Direct)
    }

    fn with_mode(mode: SubmissionMode) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let downloads = temp_dir.path().join("downloads");
        let library = temp_dir.path().join("library");
        std::fs::create_dir_all(&downloads).expect("Failed to create downloads dir");

        let config = Config {
            processing: Some(fixtures::processing_config(&downloads, &library)),
            download: DownloadConfig {
                submission: mode,
            },
            ..fixtures::config()
        };

        let attempts =
            Arc::new(SqliteAttemptStore::new(&db_path).expect("Failed to create attempt store"));
        let catalog = Arc::new(SqliteMediaCatalog::new(&db_path).expect("Failed to create catalog"));
        let indexer = Arc::new(MockIndexer::new());
        let client = Arc::new(MockDownloadClient::new());
        let converter = Arc::new(MockConverter::new());

        let service = AcquisitionService::new(
            attempts,
            catalog.clone(),
            indexer.clone(),
            Arc::new(StaticConfigResolver::new(config)),
            Arc::new(MockDownloadClientFactory::new(client.clone())),
        )
        .with_converter(converter.clone());

        Self {
            service,
            indexer,
            client,
            converter,
            catalog,
            downloads,
            library,
            _temp_dir: temp_dir,
        }
    }

    fn dune(&self) -> MediaItem {
        self.catalog
            .create(
                MediaKind::Book,
                &fixtures::media_request("Dune", &["Frank Herbert"]),
            )
            .expect("Failed to create media")
    }

    fn media_status(&self, media: &MediaItem) -> MediaStatus {
        self.catalog.get(&media.media_ref()).unwrap().status
    }
}

#[tokio::test]
async fn test_full_acquisition_lifecycle() {
    let h = TestHarness::new();
    let media = h.dune();
    h.indexer
        .set_results(
            "Dune Frank Herbert",
            vec![fixtures::release("g1", "NZBgeek", 4, "Dune - Frank Herbert")],
        )
        .await;

    let results = h.service.search_for_media(&media.id).await.unwrap();
    assert_eq!(results.len(), 1);

    let attempt = h
        .service
        .initiate_download(&media.id, &results[0])
        .await
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Downloading);
    assert_eq!(attempt.download_client_job_id.as_deref(), Some("SABnzbd_nzo_1"));
    assert_eq!(h.media_status(&media), MediaStatus::Downloading);

    let submissions = h.client.submissions().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].url, "https://indexer.example/get/g1");
    assert_eq!(submissions[0].category, "books");
    assert_eq!(submissions[0].name, "Dune");

    // The client finishes the job into the downloads folder.
    let job_dir = h.downloads.join("Dune - Frank Herbert");
    std::fs::create_dir_all(&job_dir).unwrap();
    let raw = job_dir.join("Dune - Frank Herbert.mobi");
    std::fs::write(&raw, b"mobi bytes").unwrap();
    h.client
        .set_job_status("SABnzbd_nzo_1", "Completed", Some(raw.to_str().unwrap()))
        .await;

    let status = h.service.get_download_status(&attempt.id).await.unwrap();
    assert_eq!(status.attempt.status, AttemptStatus::Downloaded);
    assert_eq!(status.progress, 100.0);
    assert_eq!(
        status.attempt.raw_file_path.as_deref(),
        Some(raw.to_str().unwrap())
    );
    assert_eq!(h.media_status(&media), MediaStatus::Downloaded);

    let converted = h.service.convert_to_canonical(&attempt.id).await;
    assert!(converted.success, "{:?}", converted);
    assert_eq!(h.converter.recorded_conversions().await.len(), 1);
    assert!(job_dir.join("Dune - Frank Herbert.epub").exists());

    let organized = h.service.organize_to_library(&attempt.id).await;
    assert!(organized.success, "{:?}", organized);
    let library_file = h.library.join("Frank Herbert/Dune/Dune.epub");
    assert_eq!(std::fs::read(&library_file).unwrap(), b"converted epub");
    assert!(h.library.join("Frank Herbert/Dune/Dune.opf").exists());

    let stored = h.catalog.get(&media.media_ref()).unwrap();
    assert_eq!(stored.status, MediaStatus::PostProcessedSuccess);
    assert_eq!(
        stored.library_path.as_deref(),
        Some(library_file.to_str().unwrap())
    );

    let attempts = h.service.get_download_attempts(&media.id).unwrap();
    assert_eq!(attempts[0].post_process_status, Some(PostProcessStatus::Completed));
}

#[tokio::test]
async fn test_search_ranks_dedups_and_filters_blacklist() {
    let h = TestHarness::new();
    let mut request = fixtures::media_request("Dune", &["Frank Herbert"]);
    request.isbn13 = Some("9780441013593".into());
    let media = h.catalog.create(MediaKind::Book, &request).unwrap();

    h.indexer
        .set_results(
            "9780441013593",
            vec![fixtures::release("isbn-hit", "zeta", 1, "Dune (ISBN)")],
        )
        .await;
    h.indexer
        .set_results(
            "Dune Frank Herbert",
            vec![
                fixtures::release("g-b", "beta", 2, "dune b"),
                fixtures::release("g-a", "Alpha", 3, "Dune A"),
                fixtures::release("isbn-hit", "zeta", 1, "duplicate of the ISBN hit"),
            ],
        )
        .await;
    h.indexer
        .set_results(
            "Dune",
            vec![fixtures::release("g-bad", "alpha", 9, "Dune bad release")],
        )
        .await;

    let results = h.service.search_for_media(&media.id).await.unwrap();
    let guids: Vec<&str> = results.iter().map(|r| r.guid.as_str()).collect();
    assert_eq!(guids, vec!["isbn-hit", "g-a", "g-b", "g-bad"]);
    assert_eq!(results[0].title, "Dune (ISBN)");

    let searches = h.indexer.recorded_searches().await;
    assert_eq!(searches.len(), 4);
    assert!(searches.iter().all(|s| s.category == Some(7000) && s.limit == 50));

    let attempt = h
        .service
        .initiate_download(&media.id, &results[3])
        .await
        .unwrap();
    h.service
        .blacklist_release(&attempt.id, BlacklistReason::WrongFile, "not the book")
        .await
        .unwrap();

    let results = h.service.search_for_media(&media.id).await.unwrap();
    let guids: Vec<&str> = results.iter().map(|r| r.guid.as_str()).collect();
    assert_eq!(guids, vec!["isbn-hit", "g-a", "g-b"]);
}

#[tokio::test]
async fn test_search_fails_only_when_every_query_fails() {
    let h = TestHarness::new();
    let media = h.dune();
    for query in ["Dune Frank Herbert", "Frank Herbert Dune", "Dune"] {
        h.indexer
            .set_query_error(query, IndexerError::Timeout(30))
            .await;
    }

    let err = h.service.search_for_media(&media.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteProtocol);

    let other = h
        .catalog
        .create(MediaKind::Book, &fixtures::media_request("Emma", &[]))
        .unwrap();
    let results = h.service.search_for_media(&other.id).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_single_active_download_per_media() {
    let h = TestHarness::new();
    let media = h.dune();
    let first = fixtures::release("g1", "NZBgeek", 4, "Dune");
    let second = fixtures::release("g2", "NZBgeek", 4, "Dune (Retail)");

    h.service.initiate_download(&media.id, &first).await.unwrap();
    let err = h
        .service
        .initiate_download(&media.id, &second)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ActiveDownloadExists);
    assert_eq!(h.client.submissions().await.len(), 1);
    assert_eq!(h.service.get_download_attempts(&media.id).unwrap().len(), 1);

    // Another media item is unaffected.
    let other = h
        .catalog
        .create(MediaKind::Audiobook, &fixtures::media_request("Dune", &[]))
        .unwrap();
    h.service.initiate_download(&other.id, &second).await.unwrap();
}

#[tokio::test]
async fn test_torrent_release_fails_attempt() {
    let h = TestHarness::new();
    let media = h.dune();
    let mut release = fixtures::release("t1", "1337x", 7, "Dune");
    release.protocol = Protocol::Torrent;

    let err = h
        .service
        .initiate_download(&media.id, &release)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let attempts = h.service.get_download_attempts(&media.id).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Failed);
    assert_eq!(attempts[0].error_type.as_deref(), Some("unsupported_protocol"));
    assert_eq!(h.media_status(&media), MediaStatus::Wanted);
    assert!(h.client.submissions().await.is_empty());
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let h = TestHarness::new();
    let media = h.dune();
    let attempt = h
        .service
        .initiate_download(&media.id, &fixtures::release("g1", "NZBgeek", 4, "Dune"))
        .await
        .unwrap();
    h.client
        .set_job_status("SABnzbd_nzo_1", "Completed", Some("/downloads/Dune"))
        .await;

    let first = h.service.get_download_status(&attempt.id).await.unwrap();
    let second = h.service.get_download_status(&attempt.id).await.unwrap();

    assert_eq!(first.attempt.status, AttemptStatus::Downloaded);
    assert_eq!(second.attempt.status, AttemptStatus::Downloaded);
    assert_eq!(first.attempt.updated_at, second.attempt.updated_at);
    assert_eq!(h.media_status(&media), MediaStatus::Downloaded);
}

#[tokio::test]
async fn test_vanished_job_fails_attempt() {
    let h = TestHarness::new();
    let media = h.dune();
    let attempt = h
        .service
        .initiate_download(&media.id, &fixtures::release("g1", "NZBgeek", 4, "Dune"))
        .await
        .unwrap();
    h.client.remove_job("SABnzbd_nzo_1").await;

    let status = h.service.get_download_status(&attempt.id).await.unwrap();

    assert_eq!(status.attempt.status, AttemptStatus::Failed);
    assert_eq!(status.attempt.error_type.as_deref(), Some("not_found"));
    assert_eq!(status.progress, 0.0);
}

#[tokio::test]
async fn test_delete_resets_media_to_wanted() {
    let h = TestHarness::new();
    let media = h.dune();
    let attempt = h
        .service
        .initiate_download(&media.id, &fixtures::release("g1", "NZBgeek", 4, "Dune"))
        .await
        .unwrap();

    let outcome = h.service.delete_attempt(&attempt.id).await.unwrap();

    assert!(outcome.success);
    assert!(outcome
        .messages
        .contains(&"Media status reset to WANTED".to_string()));
    assert_eq!(h.client.deleted_jobs().await, vec!["SABnzbd_nzo_1".to_string()]);
    assert_eq!(h.media_status(&media), MediaStatus::Wanted);
    assert!(h.service.get_download_attempts(&media.id).unwrap().is_empty());

    // The slot is free again.
    h.service
        .initiate_download(&media.id, &fixtures::release("g2", "NZBgeek", 4, "Dune"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_indexer_submission_mode() {
    let h = TestHarness::with_mode(SubmissionMode::Indexer);
    let media = h.dune();

    let attempt = h
        .service
        .initiate_download(&media.id, &fixtures::release("g1", "NZBgeek", 4, "Dune"))
        .await
        .unwrap();

    assert_eq!(attempt.status, AttemptStatus::Sent);
    assert_eq!(attempt.download_client_job_id.as_deref(), Some("indexer-g1"));
    assert_eq!(attempt.download_client, None);
    assert_eq!(
        h.indexer.recorded_submissions().await,
        vec![(4, "g1".to_string())]
    );
    assert!(h.client.submissions().await.is_empty());

    // Nothing to poll without a download client reference.
    let status = h.service.get_download_status(&attempt.id).await.unwrap();
    assert_eq!(status.attempt.status, AttemptStatus::Sent);
    assert_eq!(h.client.status_call_count().await, 0);
}

#[tokio::test]
async fn test_blacklist_twice_keeps_first_entry() {
    let h = TestHarness::new();
    let media = h.dune();
    let attempt = h
        .service
        .initiate_download(&media.id, &fixtures::release("g1", "NZBgeek", 4, "Dune"))
        .await
        .unwrap();

    let first = h
        .service
        .blacklist_release(&attempt.id, BlacklistReason::Corrupted, "bad par2")
        .await
        .unwrap();
    let second = h
        .service
        .blacklist_release(&attempt.id, BlacklistReason::Manual, "again")
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.entry.id, first.entry.id);
    assert_eq!(second.entry.reason, BlacklistReason::Corrupted);
    assert_eq!(second.attempt.status, AttemptStatus::Blacklisted);
}
