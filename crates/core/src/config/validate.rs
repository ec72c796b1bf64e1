use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Processing roots are set when processing is configured
/// - Indexer, download client and metadata provider names are non-empty and unique
/// - Metadata provider base URLs are HTTP(S)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if let Some(processing) = &config.processing {
        if processing.downloads_root.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.downloads_root cannot be empty".to_string(),
            ));
        }
        if processing.library_root.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.library_root cannot be empty".to_string(),
            ));
        }
        if processing.converter_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "processing.converter_timeout_secs cannot be 0".to_string(),
            ));
        }
    }

    check_names("indexers", config.indexers.iter().map(|i| i.name.as_str()))?;
    check_names(
        "download_clients",
        config.download_clients.iter().map(|c| c.name.as_str()),
    )?;

    check_names(
        "metadata_providers",
        config.metadata_providers.iter().map(|p| p.name.as_str()),
    )?;

    for provider in &config.metadata_providers {
        let base = provider.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "metadata_providers.{}: base_url must be an http(s) URL",
                provider.name
            )));
        }
    }

    for indexer in &config.indexers {
        if indexer.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "indexers.{}: host cannot be empty",
                indexer.name
            )));
        }
    }

    for client in &config.download_clients {
        if client.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "download_clients.{}: host cannot be empty",
                client.name
            )));
        }
    }

    Ok(())
}

fn check_names<'a>(section: &str, names: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{}: name cannot be empty",
                section
            )));
        }
        if !seen.insert(name) {
            return Err(ConfigError::ValidationError(format!(
                "{}: duplicate name '{}'",
                section, name
            )));
        }
    }
    Ok(())
}
