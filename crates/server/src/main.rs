use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tomehound_core::{
    load_config, validate_config, AcquisitionService, AttemptStore, ConfigResolver,
    HttpDownloadClientFactory, IndexerClient, MediaCatalog, MetadataProviders, ProwlarrClient,
    SqliteAttemptStore, SqliteMediaCatalog, StaticConfigResolver,
};
use tomehound_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("TOMEHOUND_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run() -> Result<()> {
    init_logging();

    // Determine config path
    let config_path = std::env::var("TOMEHOUND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Database path: {:?}", config.database.path);
    info!(
        indexers = config.indexers.len(),
        download_clients = config.download_clients.len(),
        metadata_providers = config.metadata_providers.len(),
        submission = config.download.submission.as_str(),
        processing = config.processing.is_some(),
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
    }

    let attempts: Arc<dyn AttemptStore> = Arc::new(
        SqliteAttemptStore::new(&config.database.path)
            .context("Failed to create attempt store")?,
    );
    let catalog: Arc<dyn MediaCatalog> = Arc::new(
        SqliteMediaCatalog::new(&config.database.path).context("Failed to create media catalog")?,
    );
    info!("Stores initialized");

    let resolver = Arc::new(StaticConfigResolver::new(config.clone()));
    let indexer_config = resolver
        .indexer()
        .context("No enabled indexer configured")?;
    info!("Using indexer '{}' at {}", indexer_config.name, indexer_config.host);
    let indexer: Arc<dyn IndexerClient> = Arc::new(
        ProwlarrClient::new(indexer_config).context("Failed to create indexer client")?,
    );

    let metadata = MetadataProviders::from_resolver(resolver.as_ref())
        .context("Failed to create metadata providers")?;
    if metadata.is_empty() {
        warn!("No metadata provider enabled; media cannot be added from provider records");
    }

    let service = AcquisitionService::new(
        attempts,
        catalog,
        indexer,
        resolver,
        Arc::new(HttpDownloadClientFactory),
    )
    .with_metadata_providers(metadata);

    let state = Arc::new(AppState::new(config.clone(), service));
    tokio::spawn(check_connections(state.clone()));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Log whether external services answer. Never blocks startup.
async fn check_connections(state: Arc<AppState>) {
    let report = state.service().check_connections().await;
    if report.indexer.reachable {
        info!(indexer = %report.indexer.name, "Indexer reachable");
    } else {
        warn!(indexer = %report.indexer.name, "Indexer not reachable; searches will fail");
    }
    match &report.download_client {
        Some(check) if check.reachable => info!(client = %check.name, "Download client reachable"),
        Some(check) => warn!(client = %check.name, "Download client not reachable"),
        None => warn!("No enabled download client; direct submission is unavailable"),
    }
    for check in report.metadata_providers.iter().filter(|c| !c.reachable) {
        warn!(provider = %check.name, "Metadata provider not reachable");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
