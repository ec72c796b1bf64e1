use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::catalog::MediaKind;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub processing: Option<ProcessingConfig>,
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
    #[serde(default)]
    pub download_clients: Vec<DownloadClientConfig>,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub metadata_providers: Vec<MetadataProviderConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tomehound.db")
}

/// Post-processing configuration: where downloads land, where the library lives,
/// and how to invoke the ebook converter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Root directory the download client writes completed jobs into.
    pub downloads_root: PathBuf,
    /// Root directory of the organized library.
    pub library_root: PathBuf,
    /// Path to the `ebook-convert` binary (default: resolved from PATH).
    #[serde(default = "default_converter_path")]
    pub converter_path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Converter subprocess timeout in seconds (default: 300).
    #[serde(default = "default_converter_timeout")]
    pub converter_timeout_secs: u64,
    /// Cover image fetch timeout in seconds (default: 10).
    #[serde(default = "default_cover_timeout")]
    pub cover_timeout_secs: u64,
    /// Verify SHA-256 of copied files against the source.
    #[serde(default)]
    pub verify_checksum: bool,
}

fn default_converter_path() -> PathBuf {
    PathBuf::from("ebook-convert")
}

fn default_converter_timeout() -> u64 {
    300
}

fn default_cover_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Indexer aggregator (Prowlarr) connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_indexer_port")]
    pub port: u16,
    #[serde(default)]
    pub use_ssl: bool,
    /// Optional URL base path (e.g. "prowlarr" when served behind a reverse proxy).
    #[serde(default)]
    pub base_path: Option<String>,
    pub api_key: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_indexer_timeout")]
    pub timeout_secs: u64,
}

fn default_indexer_port() -> u16 {
    9696
}

fn default_indexer_timeout() -> u64 {
    30
}

/// Supported download client implementations.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloadClientKind {
    #[default]
    Sabnzbd,
}

impl DownloadClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadClientKind::Sabnzbd => "sabnzbd",
        }
    }
}

/// Download client (SABnzbd) connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadClientConfig {
    pub name: String,
    #[serde(default)]
    pub kind: DownloadClientKind,
    pub host: String,
    #[serde(default = "default_client_port")]
    pub port: u16,
    #[serde(default)]
    pub use_ssl: bool,
    pub api_key: String,
    /// Category jobs are filed under on the client (default: "books").
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

fn default_client_port() -> u16 {
    8080
}

fn default_category() -> String {
    "books".to_string()
}

fn default_client_timeout() -> u64 {
    10
}

/// How a chosen release is handed to a download client.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Resolve the release URL and submit it to the download client ourselves.
    #[default]
    Direct,
    /// Ask the indexer to push the release to its own configured download client.
    Indexer,
}

impl SubmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMode::Direct => "direct",
            SubmissionMode::Indexer => "indexer",
        }
    }
}

/// Download initiation settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub submission: SubmissionMode,
}

/// Supported metadata provider implementations.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetadataProviderKind {
    #[default]
    Openlibrary,
}

impl MetadataProviderKind {
    pub const ALL: &'static [MetadataProviderKind] = &[MetadataProviderKind::Openlibrary];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataProviderKind::Openlibrary => "openlibrary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == value)
    }
}

/// Bibliographic metadata source used when adding wanted media.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataProviderConfig {
    pub name: String,
    #[serde(default)]
    pub kind: MetadataProviderKind,
    #[serde(default = "default_openlibrary_url")]
    pub base_url: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Media kinds this provider is asked about (default: book and audiobook).
    #[serde(default = "default_media_kinds")]
    pub media_kinds: Vec<MediaKind>,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl MetadataProviderConfig {
    pub fn supports(&self, kind: MediaKind) -> bool {
        self.media_kinds.contains(&kind)
    }
}

fn default_openlibrary_url() -> String {
    "https://openlibrary.org".to_string()
}

fn default_media_kinds() -> Vec<MediaKind> {
    vec![MediaKind::Book, MediaKind::Audiobook]
}

fn default_provider_timeout() -> u64 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing: Option<ProcessingConfig>,
    pub indexers: Vec<SanitizedIndexerConfig>,
    pub download_clients: Vec<SanitizedDownloadClientConfig>,
    pub download: DownloadConfig,
    pub metadata_providers: Vec<MetadataProviderConfig>,
}

/// Sanitized indexer config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    pub api_key_configured: bool,
    pub priority: i32,
    pub enabled: bool,
    pub timeout_secs: u64,
}

/// Sanitized download client config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloadClientConfig {
    pub name: String,
    pub kind: String,
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub api_key_configured: bool,
    pub category: String,
    pub priority: i32,
    pub enabled: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            processing: config.processing.clone(),
            indexers: config
                .indexers
                .iter()
                .map(|i| SanitizedIndexerConfig {
                    name: i.name.clone(),
                    host: i.host.clone(),
                    port: i.port,
                    use_ssl: i.use_ssl,
                    base_path: i.base_path.clone(),
                    api_key_configured: !i.api_key.is_empty(),
                    priority: i.priority,
                    enabled: i.enabled,
                    timeout_secs: i.timeout_secs,
                })
                .collect(),
            download_clients: config
                .download_clients
                .iter()
                .map(|c| SanitizedDownloadClientConfig {
                    name: c.name.clone(),
                    kind: c.kind.as_str().to_string(),
                    host: c.host.clone(),
                    port: c.port,
                    use_ssl: c.use_ssl,
                    api_key_configured: !c.api_key.is_empty(),
                    category: c.category.clone(),
                    priority: c.priority,
                    enabled: c.enabled,
                })
                .collect(),
            download: config.download.clone(),
            metadata_providers: config.metadata_providers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "tomehound.db");
        assert!(config.processing.is_none());
        assert!(config.indexers.is_empty());
        assert_eq!(config.download.submission, SubmissionMode::Direct);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[processing]
downloads_root = "/downloads"
library_root = "/library"

[[indexers]]
name = "prowlarr"
host = "prowlarr.local"
api_key = "idx-key"
base_path = "/prowlarr/"

[[download_clients]]
name = "sab"
host = "sab.local"
api_key = "sab-key"
priority = 2

[download]
submission = "indexer"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);

        let processing = config.processing.as_ref().unwrap();
        assert!(processing.enabled);
        assert_eq!(processing.converter_path.to_str().unwrap(), "ebook-convert");
        assert_eq!(processing.converter_timeout_secs, 300);
        assert_eq!(processing.cover_timeout_secs, 10);
        assert!(!processing.verify_checksum);

        let indexer = &config.indexers[0];
        assert_eq!(indexer.port, 9696);
        assert_eq!(indexer.timeout_secs, 30);
        assert_eq!(indexer.base_path.as_deref(), Some("/prowlarr/"));

        let client = &config.download_clients[0];
        assert_eq!(client.kind, DownloadClientKind::Sabnzbd);
        assert_eq!(client.category, "books");
        assert_eq!(client.priority, 2);
        assert!(client.enabled);

        assert_eq!(config.download.submission, SubmissionMode::Indexer);
        assert!(config.metadata_providers.is_empty());
    }

    #[test]
    fn test_deserialize_metadata_provider_defaults() {
        let toml = r#"
[[metadata_providers]]
name = "openlibrary"

[[metadata_providers]]
name = "ol-audio"
base_url = "http://openlibrary.local"
media_kinds = ["audiobook"]
priority = 1
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let first = &config.metadata_providers[0];
        assert_eq!(first.kind, MetadataProviderKind::Openlibrary);
        assert_eq!(first.base_url, "https://openlibrary.org");
        assert_eq!(first.timeout_secs, 10);
        assert!(first.enabled);
        assert!(first.supports(MediaKind::Book) && first.supports(MediaKind::Audiobook));

        let second = &config.metadata_providers[1];
        assert!(!second.supports(MediaKind::Book));
        assert_eq!(MetadataProviderKind::parse("openlibrary"), Some(second.kind));
        assert_eq!(MetadataProviderKind::parse("goodreads"), None);
    }

    #[test]
    fn test_deserialize_unknown_client_kind_fails() {
        let toml = r#"
[[download_clients]]
name = "nzbget"
kind = "nzbget"
host = "localhost"
api_key = "k"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_keys() {
        let toml = r#"
[[indexers]]
name = "prowlarr"
host = "localhost"
api_key = "secret"

[[download_clients]]
name = "sab"
host = "localhost"
api_key = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.indexers[0].api_key_configured);
        assert!(!sanitized.download_clients[0].api_key_configured);
        assert_eq!(sanitized.download_clients[0].kind, "sabnzbd");

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
